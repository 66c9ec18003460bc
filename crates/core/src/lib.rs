pub mod config;
pub mod domain;
pub mod flows;
pub mod reply;

pub use domain::cart::{Cart, CartLine};
pub use domain::catalog::{Catalog, CatalogError, Product, ProductCode, VariantName};
pub use domain::order::{OrderId, PlacedOrder};
pub use domain::session::{SenderId, Session, Step};
pub use flows::engine::{Disposition, OrderFlow, Outcome};
pub use reply::{Renderer, Reply};
