pub mod order_repo;
pub mod product_repo;

pub use order_repo::{EventApplication, OrderRepository, PaymentEventRecord, SqliteOrderRepository};
pub use product_repo::{ProductRepository, SqliteProductRepository};
