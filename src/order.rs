pub const ORDER_PLACED_MESSAGE: &str = "Thank you! Your order has been placed.";
pub const EMPTY_CART_MESSAGE: &str = "Cart is empty — add items from the menu.";

/// One priced cart line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub line_total: u64,
}

impl OrderLine {
    pub fn new(item: String, quantity: u32, unit_price: u64) -> Self {
        Self {
            line_total: unit_price.saturating_mul(u64::from(quantity)),
            item,
            quantity,
            unit_price,
        }
    }

    pub fn render(&self, currency: &str) -> String {
        format!(
            "{} x{} = {}{}",
            self.item, self.quantity, currency, self.line_total
        )
    }
}

/// Snapshot of a cart with computed totals
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderSummary {
    pub lines: Vec<OrderLine>,
    pub total: u64,
}

impl OrderSummary {
    pub fn from_lines(lines: Vec<OrderLine>) -> Self {
        let total = lines
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(l.line_total));
        Self { lines, total }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Plain-text summary, one line per item
    pub fn render(&self, currency: &str) -> String {
        self.lines
            .iter()
            .map(|l| l.render(currency))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What checkout hands back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub summary: OrderSummary,
    pub text: String,
    pub message: String,
}

impl Receipt {
    pub fn new(summary: OrderSummary, currency: &str) -> Self {
        Self {
            text: summary.render(currency),
            summary,
            message: ORDER_PLACED_MESSAGE.to_string(),
        }
    }
}

/// Acknowledgment shown after an add
pub fn added_message(quantity: u32, item: &str) -> String {
    format!("Added {} x {} to cart", quantity, item)
}
