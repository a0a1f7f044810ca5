//! Supplier confirmation message.

use crate::InvoiceOrder;

/// Plain-text message sent to the supplier alongside the invoice.
pub fn confirmation_message(order: &InvoiceOrder) -> String {
    let mut message = format!(
        "Hello {}, Here is supply order #{}:\n\n",
        order.supplier_name, order.order_id
    );
    for line in &order.lines {
        message.push_str(&format!("- {} (Qty: {})\n", line.title, line.mass));
    }
    message.push_str("\nPlease check the attached invoice.");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InvoiceLine;
    use libram_core::AggregateId;
    use libram_supply::SupplyOrderId;

    #[test]
    fn message_lists_each_line_with_quantity() {
        let order_id = SupplyOrderId::new(AggregateId::new());
        let order = InvoiceOrder {
            order_id,
            supplier_name: "Inkwell Distribution".to_string(),
            lines: vec![
                InvoiceLine {
                    title: "The Long Autumn".to_string(),
                    mass: 5,
                },
                InvoiceLine {
                    title: "Salt Roads".to_string(),
                    mass: 3,
                },
            ],
        };

        let message = confirmation_message(&order);
        assert_eq!(
            message,
            format!(
                "Hello Inkwell Distribution, Here is supply order #{order_id}:\n\n\
                 - The Long Autumn (Qty: 5)\n\
                 - Salt Roads (Qty: 3)\n\n\
                 Please check the attached invoice."
            )
        );
    }
}
