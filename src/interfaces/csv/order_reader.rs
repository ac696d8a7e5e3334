use crate::domain::order::{Order, OrderStatus, PaymentStatus};
use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the orders seed file.
///
/// `status` and `payment_status` are optional trailing columns; a missing or empty
/// `payment_reference` means the order has not been bound to a payment yet.
#[derive(Debug, Deserialize)]
struct OrderRow {
    id: String,
    #[serde(default)]
    payment_reference: Option<String>,
    amount: Decimal,
    currency: String,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
}

impl TryFrom<OrderRow> for Order {
    type Error = Error;

    fn try_from(row: OrderRow) -> Result<Self> {
        if row.id.is_empty() {
            return Err(Error::ValidationError("order id must not be empty".to_string()));
        }
        if row.amount.is_sign_negative() {
            return Err(Error::ValidationError(format!(
                "order {} has a negative amount",
                row.id
            )));
        }

        let mut order = Order::new(row.id.as_str(), row.amount, row.currency.to_lowercase());
        if let Some(reference) = row.payment_reference.filter(|r| !r.is_empty()) {
            order = order.with_payment_reference(reference);
        }
        order.status = row.status.unwrap_or_default();
        order.payment_status = row.payment_status.unwrap_or_default();
        Ok(order)
    }
}

/// Reads orders from a CSV source.
///
/// Whitespace is trimmed and trailing optional columns may be omitted per row.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes and validates each row.
    pub fn orders(self) -> impl Iterator<Item = Result<Order>> {
        self.reader
            .into_deserialize::<OrderRow>()
            .map(|row| row.map_err(Error::from).and_then(Order::try_from))
    }
}
