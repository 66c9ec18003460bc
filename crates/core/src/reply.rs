use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::cart::Cart;
use crate::domain::catalog::{Catalog, Product, VariantName};

/// One outbound message part. A single inbound message can produce several
/// parts, sent in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Text { body: String },
    Media { url: String },
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn media(url: impl Into<String>) -> Self {
        Self::Media { url: url.into() }
    }
}

/// Presentation layer for every user-visible message. Currency label and the
/// optional menu image are injected configuration so one engine serves any
/// catalog.
#[derive(Clone, Debug)]
pub struct Renderer {
    currency: String,
    menu_image_url: Option<String>,
}

impl Renderer {
    pub fn new(currency: impl Into<String>, menu_image_url: Option<String>) -> Self {
        Self { currency: currency.into(), menu_image_url }
    }

    pub fn welcome(&self, catalog: &Catalog) -> Vec<Reply> {
        let mut replies =
            vec![Reply::text(format!("Welcome! 🛍️ Choose a product:\n{}", self.menu_lines(catalog)))];
        if let Some(url) = &self.menu_image_url {
            replies.push(Reply::media(url.clone()));
        }
        replies
    }

    pub fn product_menu(&self, catalog: &Catalog) -> Reply {
        Reply::text(format!("Choose a product:\n{}", self.menu_lines(catalog)))
    }

    pub fn invalid_product(&self) -> Reply {
        Reply::text("❌ Invalid choice. Please reply with the product number (e.g., 1).")
    }

    pub fn variant_menu(&self, product: &Product, available: &[&VariantName]) -> Reply {
        let options = available
            .iter()
            .enumerate()
            .map(|(index, variant)| format!("{}. {}", index + 1, variant.0))
            .collect::<Vec<_>>()
            .join("\n");
        Reply::text(format!("Choose a flavor for {}:\n{options}", product.name))
    }

    pub fn invalid_variant(&self, upper: usize) -> Reply {
        Reply::text(format!("❌ Invalid flavor. Reply with a number from 1 to {upper}."))
    }

    pub fn quantity_prompt(&self, product: &Product, variant: &VariantName) -> Reply {
        Reply::text(format!("How many {} ({}) would you like?", product.name, variant.0))
    }

    pub fn invalid_quantity(&self) -> Reply {
        Reply::text("❌ Please enter a valid number (e.g., 2)")
    }

    pub fn line_added(&self, product: &Product, variant: &VariantName, quantity: u32) -> Reply {
        Reply::text(format!("Added {quantity}x {} ({}).", product.name, variant.0))
    }

    pub fn add_another_variant(&self, product: &Product) -> Reply {
        Reply::text(format!("Add another flavor of {}? (yes/no)", product.name))
    }

    pub fn add_another_product(&self) -> Reply {
        Reply::text("Add another product? (yes/no)")
    }

    pub fn answer_reprompt(&self) -> Reply {
        Reply::text("Please answer yes or no.")
    }

    pub fn cart_summary(&self, cart: &Cart) -> Reply {
        let mut body = String::from("Your order:\n");
        for line in cart.lines() {
            body.push_str(&format!(
                "{}x {} ({})\n",
                line.quantity, line.product_name, line.variant_name.0
            ));
        }
        body.push_str(&format!("Total: {}\nConfirm? (yes/no)", self.money(cart.total())));
        Reply::text(body)
    }

    pub fn location_request(&self) -> Reply {
        Reply::text("✅ Order confirmed! Please share your delivery address.")
    }

    pub fn location_reprompt(&self) -> Reply {
        Reply::text("Please share your delivery address.")
    }

    pub fn thank_you(&self) -> Reply {
        Reply::text("📦 Thank you! We'll process your order shortly.")
    }

    pub fn order_cancelled(&self) -> Reply {
        Reply::text("Order canceled. Start over by sending 'Hi'")
    }

    pub fn persistence_retry(&self) -> Reply {
        Reply::text(
            "⚠️ We couldn't record your order just now. Please send your delivery address again.",
        )
    }

    fn menu_lines(&self, catalog: &Catalog) -> String {
        catalog
            .products()
            .iter()
            .map(|product| {
                format!("{}. {} ({})", product.code.0, product.name, self.money(product.unit_price))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.currency, amount)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::cart::{Cart, CartLine};
    use crate::domain::catalog::{Catalog, Product, ProductCode, VariantName};

    use super::{Renderer, Reply};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Product {
                code: ProductCode("1".to_string()),
                name: "Chocolate Box".to_string(),
                unit_price: Decimal::new(1299, 2),
                variants: vec![
                    VariantName("Dark".to_string()),
                    VariantName("Milk".to_string()),
                    VariantName("White".to_string()),
                ],
            },
            Product {
                code: ProductCode("2".to_string()),
                name: "Cookie Pack".to_string(),
                unit_price: Decimal::new(899, 2),
                variants: vec![
                    VariantName("Vanilla".to_string()),
                    VariantName("Chocolate Chip".to_string()),
                ],
            },
        ])
        .expect("test catalog is valid")
    }

    fn body(reply: &Reply) -> &str {
        match reply {
            Reply::Text { body } => body,
            Reply::Media { .. } => panic!("expected text reply"),
        }
    }

    #[test]
    fn welcome_lists_every_product_with_price() {
        let renderer = Renderer::new("$", None);
        let replies = renderer.welcome(&catalog());

        assert_eq!(replies.len(), 1);
        let text = body(&replies[0]);
        assert!(text.starts_with("Welcome!"));
        assert!(text.contains("1. Chocolate Box ($12.99)"));
        assert!(text.contains("2. Cookie Pack ($8.99)"));
    }

    #[test]
    fn welcome_appends_menu_image_when_configured() {
        let renderer = Renderer::new("$", Some("https://cdn.example/menu.png".to_string()));
        let replies = renderer.welcome(&catalog());

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1], Reply::media("https://cdn.example/menu.png"));
    }

    #[test]
    fn variant_menu_numbers_only_the_offered_variants() {
        let renderer = Renderer::new("$", None);
        let catalog = catalog();
        let product = catalog.find("1").expect("product 1");
        let milk = VariantName("Milk".to_string());
        let white = VariantName("White".to_string());

        let reply = renderer.variant_menu(product, &[&milk, &white]);
        let text = body(&reply);
        assert!(text.contains("1. Milk"));
        assert!(text.contains("2. White"));
        assert!(!text.contains("Dark"));
    }

    #[test]
    fn cart_summary_lists_lines_and_total() {
        let renderer = Renderer::new("$", None);
        let mut cart = Cart::default();
        cart.push(CartLine {
            product_name: "Chocolate Box".to_string(),
            variant_name: VariantName("Dark".to_string()),
            quantity: 2,
            unit_price: Decimal::new(1299, 2),
        });
        cart.push(CartLine {
            product_name: "Cookie Pack".to_string(),
            variant_name: VariantName("Vanilla".to_string()),
            quantity: 1,
            unit_price: Decimal::new(899, 2),
        });

        let text = body(&renderer.cart_summary(&cart)).to_string();
        assert!(text.contains("2x Chocolate Box (Dark)"));
        assert!(text.contains("1x Cookie Pack (Vanilla)"));
        assert!(text.contains("Total: $34.97"));
        assert!(text.ends_with("Confirm? (yes/no)"));
    }

    #[test]
    fn currency_label_is_injected() {
        let renderer = Renderer::new("€", None);
        let text = body(&renderer.product_menu(&catalog())).to_string();
        assert!(text.contains("(€12.99)"));
    }
}
