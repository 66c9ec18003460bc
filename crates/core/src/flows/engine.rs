use std::collections::BTreeSet;

use crate::domain::cart::{Cart, CartLine};
use crate::domain::catalog::{Catalog, Product, ProductCode, VariantName};
use crate::domain::session::Step;
use crate::flows::input::{self, Answer};
use crate::reply::{Renderer, Reply};

/// What the caller must do with the session after a transition. `Stay` means
/// the inbound text was rejected and nothing may be mutated.
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    Stay,
    Advance(Step),
    AddLine { line: CartLine, next: Step },
    Cancel,
    Finalize { location: String },
    Reset,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub disposition: Disposition,
    pub replies: Vec<Reply>,
}

impl Outcome {
    fn stay(reply: Reply) -> Self {
        Self { disposition: Disposition::Stay, replies: vec![reply] }
    }

    fn advance(next: Step, replies: Vec<Reply>) -> Self {
        Self { disposition: Disposition::Advance(next), replies }
    }
}

/// The per-sender conversation state machine. Catalog and presentation are
/// injected once; `apply` is a pure function of (step, cart, inbound text).
pub struct OrderFlow {
    catalog: Catalog,
    renderer: Renderer,
}

impl OrderFlow {
    pub fn new(catalog: Catalog, renderer: Renderer) -> Self {
        Self { catalog, renderer }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// First-contact greeting, sent instead of interpreting the opening
    /// message body.
    pub fn welcome(&self) -> Vec<Reply> {
        self.renderer.welcome(&self.catalog)
    }

    /// Reply used when the ledger append fails and the sender should resend
    /// the delivery location.
    pub fn persistence_retry(&self) -> Reply {
        self.renderer.persistence_retry()
    }

    pub fn apply(&self, step: &Step, cart: &Cart, raw: &str) -> Outcome {
        let msg = input::normalize(raw);
        match step {
            Step::SelectingProduct => self.select_product(&msg),
            Step::SelectingVariant { product, taken } => self.select_variant(product, taken, &msg),
            Step::AwaitingQuantity { product, taken, variant } => {
                self.record_quantity(product, taken, variant, &msg)
            }
            Step::AddAnotherVariant { product, taken } => {
                self.another_variant(product, taken, &msg)
            }
            Step::AddAnotherProduct => self.another_product(cart, &msg),
            Step::Confirming => self.confirm(&msg),
            Step::AwaitingLocation => self.capture_location(raw),
        }
    }

    fn select_product(&self, msg: &str) -> Outcome {
        let Some(product) = self.catalog.find(msg) else {
            return Outcome::stay(self.renderer.invalid_product());
        };

        let taken = BTreeSet::new();
        let available = remaining(product, &taken);
        if available.is_empty() {
            return Outcome::advance(
                Step::AddAnotherProduct,
                vec![self.renderer.add_another_product()],
            );
        }

        let menu = self.renderer.variant_menu(product, &available);
        Outcome::advance(Step::SelectingVariant { product: product.code.clone(), taken }, vec![menu])
    }

    fn select_variant(
        &self,
        product: &ProductCode,
        taken: &BTreeSet<VariantName>,
        msg: &str,
    ) -> Outcome {
        let Some(product) = self.lookup(product, taken) else {
            return self.reset();
        };

        // Offered numbering is always recomputed against the currently
        // remaining set, so a stale prompt can never alias to a committed
        // variant.
        let available = remaining(product, taken);
        if available.is_empty() {
            return self.reset();
        }

        let Some(choice) = input::parse_menu_choice(msg, available.len()) else {
            return Outcome::stay(self.renderer.invalid_variant(available.len()));
        };

        let variant = available[choice - 1].clone();
        let prompt = self.renderer.quantity_prompt(product, &variant);
        Outcome::advance(
            Step::AwaitingQuantity { product: product.code.clone(), taken: taken.clone(), variant },
            vec![prompt],
        )
    }

    fn record_quantity(
        &self,
        product: &ProductCode,
        taken: &BTreeSet<VariantName>,
        variant: &VariantName,
        msg: &str,
    ) -> Outcome {
        let Some(product) = self.lookup(product, taken) else {
            return self.reset();
        };
        if !product.variants.contains(variant) || taken.contains(variant) {
            return self.reset();
        }

        let Ok(quantity) = input::parse_quantity(msg) else {
            return Outcome::stay(self.renderer.invalid_quantity());
        };

        let line = CartLine {
            product_name: product.name.clone(),
            variant_name: variant.clone(),
            quantity,
            unit_price: product.unit_price,
        };

        let mut taken = taken.clone();
        taken.insert(variant.clone());
        let added = self.renderer.line_added(product, variant, quantity);

        let (next, prompt) = if remaining(product, &taken).is_empty() {
            (Step::AddAnotherProduct, self.renderer.add_another_product())
        } else {
            let prompt = self.renderer.add_another_variant(product);
            (Step::AddAnotherVariant { product: product.code.clone(), taken }, prompt)
        };

        Outcome { disposition: Disposition::AddLine { line, next }, replies: vec![added, prompt] }
    }

    fn another_variant(
        &self,
        product: &ProductCode,
        taken: &BTreeSet<VariantName>,
        msg: &str,
    ) -> Outcome {
        let Some(product) = self.lookup(product, taken) else {
            return self.reset();
        };

        match input::parse_answer(msg) {
            Some(Answer::Yes) => {
                let available = remaining(product, taken);
                if available.is_empty() {
                    return Outcome::advance(
                        Step::AddAnotherProduct,
                        vec![self.renderer.add_another_product()],
                    );
                }
                let menu = self.renderer.variant_menu(product, &available);
                Outcome::advance(
                    Step::SelectingVariant { product: product.code.clone(), taken: taken.clone() },
                    vec![menu],
                )
            }
            Some(Answer::No) => Outcome::advance(
                Step::AddAnotherProduct,
                vec![self.renderer.add_another_product()],
            ),
            None => Outcome::stay(self.renderer.answer_reprompt()),
        }
    }

    fn another_product(&self, cart: &Cart, msg: &str) -> Outcome {
        match input::parse_answer(msg) {
            Some(Answer::Yes) => {
                Outcome::advance(Step::SelectingProduct, vec![self.renderer.product_menu(&self.catalog)])
            }
            Some(Answer::No) => {
                Outcome::advance(Step::Confirming, vec![self.renderer.cart_summary(cart)])
            }
            None => Outcome::stay(self.renderer.answer_reprompt()),
        }
    }

    fn confirm(&self, msg: &str) -> Outcome {
        match input::parse_answer(msg) {
            Some(Answer::Yes) => {
                Outcome::advance(Step::AwaitingLocation, vec![self.renderer.location_request()])
            }
            Some(Answer::No) => Outcome {
                disposition: Disposition::Cancel,
                replies: vec![self.renderer.order_cancelled()],
            },
            None => Outcome::stay(self.renderer.answer_reprompt()),
        }
    }

    /// Delivery location keeps the raw (trimmed) text; case folding would
    /// corrupt an address.
    fn capture_location(&self, raw: &str) -> Outcome {
        let location = raw.trim();
        if location.is_empty() {
            return Outcome::stay(self.renderer.location_reprompt());
        }

        Outcome {
            disposition: Disposition::Finalize { location: location.to_string() },
            replies: vec![self.renderer.thank_you()],
        }
    }

    /// A step payload referencing catalog entries that no longer exist is
    /// treated as corruption: the sender starts over from the menu.
    fn reset(&self) -> Outcome {
        Outcome { disposition: Disposition::Reset, replies: self.welcome() }
    }

    fn lookup(&self, code: &ProductCode, taken: &BTreeSet<VariantName>) -> Option<&Product> {
        let product = self.catalog.find(&code.0)?;
        taken.iter().all(|variant| product.variants.contains(variant)).then_some(product)
    }
}

fn remaining<'a>(product: &'a Product, taken: &BTreeSet<VariantName>) -> Vec<&'a VariantName> {
    product.variants.iter().filter(|variant| !taken.contains(variant)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use crate::domain::cart::Cart;
    use crate::domain::catalog::{Catalog, Product, ProductCode, VariantName};
    use crate::domain::session::Step;
    use crate::reply::{Renderer, Reply};

    use super::{Disposition, OrderFlow};

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

    fn flow() -> OrderFlow {
        OrderFlow::new(catalog(), Renderer::new("$", None))
    }

    fn text(reply: &Reply) -> &str {
        match reply {
            Reply::Text { body } => body,
            Reply::Media { .. } => panic!("expected text reply"),
        }
    }

    /// Applies one message and folds the disposition into (step, cart),
    /// panicking on terminal dispositions so walk-through tests stay honest.
    fn drive(flow: &OrderFlow, step: &mut Step, cart: &mut Cart, msg: &str) -> Vec<Reply> {
        let outcome = flow.apply(step, cart, msg);
        match outcome.disposition {
            Disposition::Stay => {}
            Disposition::Advance(next) => *step = next,
            Disposition::AddLine { line, next } => {
                cart.push(line);
                *step = next;
            }
            other => panic!("unexpected terminal disposition: {other:?}"),
        }
        outcome.replies
    }

    #[test]
    fn valid_product_code_offers_the_full_variant_list() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        let replies = drive(&flow, &mut step, &mut cart, "1");

        match &step {
            Step::SelectingVariant { product, taken } => {
                assert_eq!(product.0, "1");
                assert!(taken.is_empty());
            }
            other => panic!("expected variant selection, got {other:?}"),
        }
        let menu = text(&replies[0]);
        assert!(menu.contains("1. Dark"));
        assert!(menu.contains("2. Milk"));
        assert!(menu.contains("3. White"));
    }

    #[test]
    fn unknown_product_code_reprompts_without_mutation() {
        let flow = flow();
        let step = Step::SelectingProduct;
        let cart = Cart::default();

        let outcome = flow.apply(&step, &cart, "99");

        assert_eq!(outcome.disposition, Disposition::Stay);
        assert!(text(&outcome.replies[0]).contains("Invalid choice"));
    }

    #[test]
    fn product_codes_match_case_insensitively_after_normalization() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "  1  ");
        assert!(matches!(step, Step::SelectingVariant { .. }));
    }

    #[test]
    fn two_variants_commit_in_insertion_order_with_their_quantities() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "1"); // Dark
        drive(&flow, &mut step, &mut cart, "2");
        drive(&flow, &mut step, &mut cart, "yes");
        drive(&flow, &mut step, &mut cart, "1"); // Milk, renumbered
        drive(&flow, &mut step, &mut cart, "1");

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].variant_name.0, "Dark");
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[1].variant_name.0, "Milk");
        assert_eq!(cart.lines()[1].quantity, 1);

        match &step {
            Step::AddAnotherVariant { taken, .. } => {
                let names: Vec<&str> = taken.iter().map(|v| v.0.as_str()).collect();
                assert_eq!(names, vec!["Dark", "Milk"]);
            }
            other => panic!("expected add-another-variant, got {other:?}"),
        }
    }

    #[test]
    fn variant_menu_renumbers_against_the_remaining_set() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "2"); // Milk from [Dark, Milk, White]
        drive(&flow, &mut step, &mut cart, "1");
        let replies = drive(&flow, &mut step, &mut cart, "yes");

        let menu = text(&replies[0]);
        assert!(menu.contains("1. Dark"));
        assert!(menu.contains("2. White"));
        assert!(!menu.contains("Milk"));

        // "2" now means White, not the previously listed Milk.
        drive(&flow, &mut step, &mut cart, "2");
        match &step {
            Step::AwaitingQuantity { variant, .. } => assert_eq!(variant.0, "White"),
            other => panic!("expected quantity step, got {other:?}"),
        }
    }

    #[test]
    fn committing_every_variant_skips_to_add_another_product() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "2");
        drive(&flow, &mut step, &mut cart, "1"); // Vanilla
        drive(&flow, &mut step, &mut cart, "3");
        drive(&flow, &mut step, &mut cart, "yes");
        drive(&flow, &mut step, &mut cart, "1"); // Chocolate Chip
        let replies = drive(&flow, &mut step, &mut cart, "2");

        assert_eq!(step, Step::AddAnotherProduct);
        assert!(text(&replies[1]).contains("Add another product?"));
    }

    #[test]
    fn invalid_variant_choice_reprompts_with_the_menu_bounds() {
        let flow = flow();
        let step = Step::SelectingVariant {
            product: ProductCode("1".to_string()),
            taken: BTreeSet::new(),
        };
        let cart = Cart::default();

        for bad in ["0", "4", "dark", ""] {
            let outcome = flow.apply(&step, &cart, bad);
            assert_eq!(outcome.disposition, Disposition::Stay, "input {bad:?} must not advance");
            assert!(text(&outcome.replies[0]).contains("1 to 3"));
        }
    }

    #[test]
    fn rejected_quantities_leave_cart_and_step_unchanged() {
        let flow = flow();
        let step = Step::AwaitingQuantity {
            product: ProductCode("1".to_string()),
            taken: BTreeSet::new(),
            variant: VariantName("Dark".to_string()),
        };
        let cart = Cart::default();

        for bad in ["-3", "abc", "0", "2.5", ""] {
            let outcome = flow.apply(&step, &cart, bad);
            assert_eq!(outcome.disposition, Disposition::Stay, "input {bad:?} must not advance");
            assert!(text(&outcome.replies[0]).contains("valid number"));
        }
    }

    #[test]
    fn yes_no_steps_reprompt_on_anything_else() {
        let flow = flow();
        let cart = Cart::default();
        let steps = [
            Step::AddAnotherVariant {
                product: ProductCode("1".to_string()),
                taken: BTreeSet::new(),
            },
            Step::AddAnotherProduct,
            Step::Confirming,
        ];

        for step in steps {
            let outcome = flow.apply(&step, &cart, "maybe");
            assert_eq!(outcome.disposition, Disposition::Stay);
            assert_eq!(text(&outcome.replies[0]), "Please answer yes or no.");
        }
    }

    #[test]
    fn declining_more_products_summarizes_the_cart() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "2");
        drive(&flow, &mut step, &mut cart, "no");
        let replies = drive(&flow, &mut step, &mut cart, "no");

        assert_eq!(step, Step::Confirming);
        let summary = text(&replies[0]);
        assert!(summary.contains("2x Chocolate Box (Dark)"));
        assert!(summary.contains("Total: $25.98"));
    }

    #[test]
    fn declining_confirmation_cancels_the_session() {
        let flow = flow();
        let outcome = flow.apply(&Step::Confirming, &Cart::default(), "no");

        assert_eq!(outcome.disposition, Disposition::Cancel);
        assert!(text(&outcome.replies[0]).contains("Order canceled"));
    }

    #[test]
    fn confirming_requests_the_delivery_location() {
        let flow = flow();
        let outcome = flow.apply(&Step::Confirming, &Cart::default(), "YES");

        assert_eq!(outcome.disposition, Disposition::Advance(Step::AwaitingLocation));
        assert!(text(&outcome.replies[0]).contains("delivery address"));
    }

    #[test]
    fn location_text_is_kept_verbatim_apart_from_trimming() {
        let flow = flow();
        let outcome =
            flow.apply(&Step::AwaitingLocation, &Cart::default(), "  12 Main St, Apt 4B  ");

        assert_eq!(
            outcome.disposition,
            Disposition::Finalize { location: "12 Main St, Apt 4B".to_string() }
        );
        assert!(text(&outcome.replies[0]).contains("Thank you"));
    }

    #[test]
    fn blank_location_reprompts() {
        let flow = flow();
        let outcome = flow.apply(&Step::AwaitingLocation, &Cart::default(), "   ");

        assert_eq!(outcome.disposition, Disposition::Stay);
        assert!(text(&outcome.replies[0]).contains("delivery address"));
    }

    #[test]
    fn step_referencing_a_vanished_product_resets_the_conversation() {
        let flow = flow();
        let step = Step::SelectingVariant {
            product: ProductCode("99".to_string()),
            taken: BTreeSet::new(),
        };

        let outcome = flow.apply(&step, &Cart::default(), "1");

        assert_eq!(outcome.disposition, Disposition::Reset);
        assert!(text(&outcome.replies[0]).contains("Choose a product"));
    }

    #[test]
    fn step_with_foreign_taken_variant_resets_the_conversation() {
        let flow = flow();
        let mut taken = BTreeSet::new();
        taken.insert(VariantName("Pistachio".to_string()));
        let step = Step::AddAnotherVariant { product: ProductCode("1".to_string()), taken };

        let outcome = flow.apply(&step, &Cart::default(), "yes");

        assert_eq!(outcome.disposition, Disposition::Reset);
    }

    #[test]
    fn taken_set_never_leaves_the_product_variant_list() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();
        let catalog = catalog();
        let variants = &catalog.find("1").expect("product 1").variants;

        drive(&flow, &mut step, &mut cart, "1");
        for pick in ["1", "1"] {
            drive(&flow, &mut step, &mut cart, pick);
            if let Step::AwaitingQuantity { taken, .. } | Step::AddAnotherVariant { taken, .. } =
                &step
            {
                assert!(taken.iter().all(|variant| variants.contains(variant)));
            }
            if matches!(step, Step::AddAnotherVariant { .. }) {
                drive(&flow, &mut step, &mut cart, "yes");
            }
        }
    }

    #[test]
    fn full_order_walkthrough_reaches_finalize_with_expected_total() {
        let flow = flow();
        let mut step = Step::SelectingProduct;
        let mut cart = Cart::default();

        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "1"); // Dark
        drive(&flow, &mut step, &mut cart, "2");
        drive(&flow, &mut step, &mut cart, "no");
        drive(&flow, &mut step, &mut cart, "yes");
        drive(&flow, &mut step, &mut cart, "2"); // Cookie Pack
        drive(&flow, &mut step, &mut cart, "1"); // Vanilla
        drive(&flow, &mut step, &mut cart, "1");
        drive(&flow, &mut step, &mut cart, "no");
        drive(&flow, &mut step, &mut cart, "no");
        drive(&flow, &mut step, &mut cart, "yes");

        assert_eq!(step, Step::AwaitingLocation);
        assert_eq!(cart.total(), Decimal::new(3497, 2));

        let outcome = flow.apply(&step, &cart, "12 Main St");
        assert_eq!(
            outcome.disposition,
            Disposition::Finalize { location: "12 Main St".to_string() }
        );
    }
}
