pub mod catalog_service;
pub mod checkout_service;
pub mod fulfillment_service;

pub use catalog_service::CatalogService;
pub use checkout_service::{CheckoutHandle, CheckoutService, CheckoutSettings};
pub use fulfillment_service::{
    FulfillmentJob, FulfillmentQueue, FulfillmentService, NotificationOutcome, spawn_fulfillment_worker,
};
