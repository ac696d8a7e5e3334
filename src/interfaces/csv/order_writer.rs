use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRecord<'a> {
    id: &'a str,
    status: &'static str,
    payment_status: &'static str,
    payment_reference: &'a str,
    amount: String,
    currency: &'a str,
}

impl<'a> From<&'a Order> for OrderRecord<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            id: order.id.as_str(),
            status: order.status.as_str(),
            payment_status: order.payment_status.as_str(),
            payment_reference: order.payment_reference.as_deref().unwrap_or_default(),
            amount: order.amount.normalize().to_string(),
            currency: &order.currency,
        }
    }
}

/// Writes the final order table as CSV.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every order, header first, and flushes the sink.
    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        let mut empty = true;
        for order in orders {
            self.writer.serialize(OrderRecord::from(&order))?;
            empty = false;
        }
        if empty {
            self.writer.write_record([
                "id",
                "status",
                "payment_status",
                "payment_reference",
                "amount",
                "currency",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentStatus;
    use rust_decimal_macros::dec;

    fn render(orders: Vec<Order>) -> String {
        let mut buffer = Vec::new();
        OrderWriter::new(&mut buffer).write_orders(orders).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_writer_output() {
        let mut paid = Order::new("o-1", dec!(42.50), "usd").with_payment_reference("pi_1");
        paid.payment_status = PaymentStatus::Succeeded;
        let unbound = Order::new("o-2", dec!(10.00), "eur");

        let output = render(vec![paid, unbound]);
        assert_eq!(
            output,
            "id,status,payment_status,payment_reference,amount,currency\n\
             o-1,ordered,succeeded,pi_1,42.5,usd\n\
             o-2,ordered,pending,,10,eur\n"
        );
    }

    #[test]
    fn test_writer_header_only_when_empty() {
        assert_eq!(
            render(Vec::new()),
            "id,status,payment_status,payment_reference,amount,currency\n"
        );
    }
}
