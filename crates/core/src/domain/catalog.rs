use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductCode(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantName(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: ProductCode,
    pub name: String,
    pub unit_price: Decimal,
    pub variants: Vec<VariantName>,
}

/// Static product menu, loaded once at startup. Insertion order is display
/// order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    products: Vec<Product>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("catalog must contain at least one product")]
    Empty,
    #[error("duplicate product code `{0}`")]
    DuplicateCode(String),
    #[error("product `{0}` has no variants")]
    NoVariants(String),
    #[error("product `{0}` has a non-positive unit price")]
    NonPositivePrice(String),
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        if products.is_empty() {
            return Err(CatalogError::Empty);
        }

        for (index, product) in products.iter().enumerate() {
            let clash = products[..index]
                .iter()
                .any(|earlier| earlier.code.0.eq_ignore_ascii_case(&product.code.0));
            if clash {
                return Err(CatalogError::DuplicateCode(product.code.0.clone()));
            }
            if product.variants.is_empty() {
                return Err(CatalogError::NoVariants(product.code.0.clone()));
            }
            if product.unit_price <= Decimal::ZERO {
                return Err(CatalogError::NonPositivePrice(product.code.0.clone()));
            }
        }

        Ok(Self { products })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        let file: CatalogFile = toml::from_str(&raw)
            .map_err(|source| CatalogError::ParseFile { path: path.to_path_buf(), source })?;

        Self::new(file.product)
    }

    /// Product codes are matched case-insensitively against normalized input.
    pub fn find(&self, code: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.code.0.eq_ignore_ascii_case(code))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    product: Vec<Product>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::{Catalog, CatalogError, Product, ProductCode, VariantName};

    fn product(code: &str, variants: &[&str]) -> Product {
        Product {
            code: ProductCode(code.to_string()),
            name: format!("Product {code}"),
            unit_price: Decimal::new(1299, 2),
            variants: variants.iter().map(|name| VariantName(name.to_string())).collect(),
        }
    }

    #[test]
    fn find_matches_codes_case_insensitively() {
        let catalog = Catalog::new(vec![product("A1", &["Dark"])]).expect("valid catalog");
        assert!(catalog.find("a1").is_some());
        assert!(catalog.find("A1").is_some());
        assert!(catalog.find("b2").is_none());
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(Catalog::new(Vec::new()), Err(CatalogError::Empty)));
    }

    #[test]
    fn rejects_duplicate_codes_ignoring_case() {
        let error = Catalog::new(vec![product("a1", &["Dark"]), product("A1", &["Milk"])])
            .expect_err("duplicate codes must fail");
        assert!(matches!(error, CatalogError::DuplicateCode(code) if code == "A1"));
    }

    #[test]
    fn rejects_products_without_variants() {
        let error =
            Catalog::new(vec![product("1", &[])]).expect_err("variant-less product must fail");
        assert!(matches!(error, CatalogError::NoVariants(code) if code == "1"));
    }

    #[test]
    fn rejects_non_positive_prices() {
        let mut bad = product("1", &["Dark"]);
        bad.unit_price = Decimal::ZERO;
        let error = Catalog::new(vec![bad]).expect_err("zero price must fail");
        assert!(matches!(error, CatalogError::NonPositivePrice(code) if code == "1"));
    }

    #[test]
    fn loads_catalog_from_toml_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("catalog.toml");
        let mut file = std::fs::File::create(&path).expect("create catalog file");
        write!(
            file,
            r#"
[[product]]
code = "1"
name = "Chocolate Box"
unit_price = "12.99"
variants = ["Dark", "Milk", "White"]

[[product]]
code = "2"
name = "Cookie Pack"
unit_price = "8.99"
variants = ["Vanilla", "Chocolate Chip"]
"#
        )
        .expect("write catalog file");

        let catalog = Catalog::load(&path).expect("catalog should load");
        assert_eq!(catalog.products().len(), 2);
        let chocolate = catalog.find("1").expect("product 1 present");
        assert_eq!(chocolate.name, "Chocolate Box");
        assert_eq!(chocolate.unit_price, Decimal::new(1299, 2));
        assert_eq!(chocolate.variants.len(), 3);
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let error =
            Catalog::load(&dir.path().join("absent.toml")).expect_err("missing file must fail");
        assert!(matches!(error, CatalogError::ReadFile { .. }));
    }
}
