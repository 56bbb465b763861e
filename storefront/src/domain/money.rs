use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// 以最小货币单位表示的金额，例如美分
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinorUnits(pub i64);

impl MinorUnits {
    /// 主币单位转最小单位，四舍五入（.5 向上）。负数或溢出返回 None
    pub fn from_major(amount: Decimal) -> Option<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return None;
        }

        amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 订单总额 = 单价 × 数量
pub fn line_total(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}
