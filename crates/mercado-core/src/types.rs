//! # Domain Types
//!
//! Core domain types used throughout Mercado.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  category       │   │  type, status   │   │  balance_cents  │       │
//! │  │  cost / sale    │   │  items[]        │   │  history[]      │       │
//! │  │  stock, barcode │   │  payments[]     │   └─────────────────┘       │
//! │  └─────────────────┘   │  plan?          │                              │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StoreSettings  │   │    SaleType     │   │  PaymentMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  links          │   │  Cash           │   │  Cash           │       │
//! │  │  admins         │   │  Credit         │   │  Card/Transfer  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## References Between Records
//! Sales point at customers and products by id only. Nothing keeps those ids
//! alive: a sale may outlive the customer or product it names, and readers
//! must tolerate the dangling reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::installment::{InstallmentPlan, InstallmentStatus};
use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// Product category shown as a filter on the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Clothing,
    Footwear,
    Accessories,
    Electronics,
    Home,
    Beauty,
    Food,
    Other,
}

impl Category {
    /// Every category, in storefront display order.
    pub const fn all() -> &'static [Category] {
        &[
            Category::Clothing,
            Category::Footwear,
            Category::Accessories,
            Category::Electronics,
            Category::Home,
            Category::Beauty,
            Category::Food,
            Category::Other,
        ]
    }

    /// Wire / storage name (`"clothing"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Clothing => "clothing",
            Category::Footwear => "footwear",
            Category::Accessories => "accessories",
            Category::Electronics => "electronics",
            Category::Home => "home",
            Category::Beauty => "beauty",
            Category::Food => "food",
            Category::Other => "other",
        }
    }

    /// Parses a wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Category> {
        let value = value.trim();
        Category::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(value))
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the inventory, and (when active) on the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on the storefront and on sale lines.
    pub name: String,

    /// Optional long description for the product page.
    pub description: Option<String>,

    pub category: Category,

    /// What the store paid per unit, in cents. Never shown publicly.
    pub cost_price_cents: i64,

    /// Shelf price per unit, in cents.
    pub sale_price_cents: i64,

    /// Units on hand. Expected to stay ≥ 0 unless negative stock is allowed.
    pub stock: i64,

    /// Barcode (EAN-13, UPC-A, ...). Unique when present.
    pub barcode: Option<String>,

    /// Encoded images (data URLs or URLs), first one is the cover.
    pub images: Vec<String>,

    /// Inactive products are hidden from the storefront and the register.
    pub active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Builds a new active product from validated input.
    pub fn new(id: String, input: NewProduct, now: DateTime<Utc>) -> Self {
        Product {
            id,
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            cost_price_cents: input.cost_price_cents,
            sale_price_cents: input.sale_price_cents,
            stock: input.stock,
            barcode: input.barcode.filter(|b| !b.trim().is_empty()),
            images: input.images,
            active: input.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Checks whether `quantity` units can leave the shelf.
    pub fn can_sell(&self, quantity: i64, allow_negative_stock: bool) -> bool {
        allow_negative_stock || self.stock >= quantity
    }

    /// Applies a partial update. `None` fields are left untouched.
    ///
    /// `barcode: Some("")` clears the barcode.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = if description.trim().is_empty() {
                None
            } else {
                Some(description)
            };
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(cost) = patch.cost_price_cents {
            self.cost_price_cents = cost;
        }
        if let Some(price) = patch.sale_price_cents {
            self.sale_price_cents = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(barcode) = patch.barcode {
            self.barcode = if barcode.trim().is_empty() {
                None
            } else {
                Some(barcode)
            };
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        self.updated_at = now;
    }

    /// The storefront view of this product (no cost price).
    pub fn to_public(&self) -> PublicProduct {
        PublicProduct {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            sale_price_cents: self.sale_price_cents,
            in_stock: self.stock > 0,
            stock: self.stock.max(0),
            images: self.images.clone(),
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Partial update for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub cost_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub barcode: Option<String>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
}

/// What an anonymous storefront visitor sees of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PublicProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub sale_price_cents: i64,
    pub in_stock: bool,
    pub stock: i64,
    pub images: Vec<String>,
}

/// A category together with how many active products it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
}

// =============================================================================
// Sale Type / Status
// =============================================================================

/// How the sale is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    /// Paid in full at the register.
    Cash,
    /// Customer owes the remaining balance.
    Credit,
}

impl SaleType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleType::Cash => "cash",
            SaleType::Credit => "credit",
        }
    }
}

/// Whether anything is still owed on a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Paid,
    Pending,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Paid => "paid",
            SaleStatus::Pending => "pending",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Bank transfer or mobile wallet.
    Transfer,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub quantity: i64,
    /// Sale price at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Cost price at time of sale (frozen), drives profit.
    pub unit_cost_cents: i64,
}

impl SaleItem {
    /// unit_price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    /// unit_cost × quantity.
    #[inline]
    pub fn line_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Money received against a sale.
///
/// A cash sale carries exactly one payment; a credit sale collects its down
/// payment and later payments here, one entry per collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
    /// Installment numbers this payment settled (empty for free-form).
    pub installment_numbers: Vec<u32>,
    pub note: Option<String>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed point-of-sale transaction.
///
/// ## Money Invariants
/// ```text
/// subtotal = Σ item.unit_price × item.quantity
/// total    = subtotal − discount
/// profit   = total − cost_total
/// remaining_balance = total − Σ payments
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub cost_total_cents: i64,
    pub profit_cents: i64,
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    pub items: Vec<SaleItem>,
    pub customer_id: Option<String>,
    pub status: SaleStatus,
    pub payments: Vec<Payment>,
    pub remaining_balance_cents: i64,
    pub installment_plan: Option<InstallmentPlan>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn remaining_balance(&self) -> Money {
        Money::from_cents(self.remaining_balance_cents)
    }

    /// Sum of every payment recorded on the sale.
    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(Payment::amount).sum()
    }

    /// Installments still owed, in schedule order.
    pub fn pending_installments(&self) -> impl Iterator<Item = &crate::installment::Installment> {
        self.installment_plan
            .iter()
            .flat_map(|plan| plan.installments.iter())
            .filter(|i| i.status == InstallmentStatus::Pending)
    }

    /// Total units across all lines.
    pub fn units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who buys on credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Phone, e-mail or any free-form contact note.
    pub contact: Option<String>,
    /// Running debt: what the customer still owes across credit sales.
    pub balance_cents: i64,
    /// Ids of the customer's sales, oldest first.
    pub history: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(id: String, input: NewCustomer, now: DateTime<Utc>) -> Self {
        Customer {
            id,
            name: input.name.trim().to_string(),
            contact: input.contact.filter(|c| !c.trim().is_empty()),
            balance_cents: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    pub fn apply_patch(&mut self, patch: CustomerPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(contact) = patch.contact {
            self.contact = if contact.trim().is_empty() {
                None
            } else {
                Some(contact)
            };
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub contact: Option<String>,
}

// =============================================================================
// Store Settings
// =============================================================================

/// Public contact and social links shown on the storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StoreLinks {
    pub store_name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub tiktok: Option<String>,
}

/// A stored admin login. The hash is a PHC string; the plain password is
/// never kept.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdminCredential {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Admin account as listed in the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    pub username: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl From<&AdminCredential> for AdminSummary {
    fn from(cred: &AdminCredential) -> Self {
        AdminSummary {
            username: cred.username.clone(),
            created_at: cred.created_at,
        }
    }
}

/// Everything on the admin settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub links: StoreLinks,
    pub admins: Vec<AdminSummary>,
}

// =============================================================================
// Change Feed
// =============================================================================

/// Which collection a change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Products,
    Sales,
    Customers,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Pushed to UI clients after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(collection: Collection, id: impl Into<String>, kind: ChangeKind) -> Self {
        ChangeEvent {
            collection,
            id: id.into(),
            kind,
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        let now = Utc::now();
        Product::new(
            "p-1".to_string(),
            NewProduct {
                name: "  Linen Shirt ".to_string(),
                category: Category::Clothing,
                cost_price_cents: 1_200,
                sale_price_cents: 2_500,
                stock: 4,
                barcode: Some(String::new()),
                ..Default::default()
            },
            now,
        )
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Clothing"), Some(Category::Clothing));
        assert_eq!(Category::parse(" beauty "), Some(Category::Beauty));
        assert_eq!(Category::parse("weapons"), None);
        assert_eq!(Category::all().len(), 8);
    }

    #[test]
    fn test_new_product_normalizes_input() {
        let product = sample_product();
        assert_eq!(product.name, "Linen Shirt");
        assert!(product.barcode.is_none());
        assert!(product.active);
    }

    #[test]
    fn test_can_sell() {
        let product = sample_product();
        assert!(product.can_sell(4, false));
        assert!(!product.can_sell(5, false));
        assert!(product.can_sell(5, true));
    }

    #[test]
    fn test_apply_patch_only_touches_given_fields() {
        let mut product = sample_product();
        product.apply_patch(
            ProductPatch {
                sale_price_cents: Some(2_900),
                active: Some(false),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(product.sale_price_cents, 2_900);
        assert_eq!(product.cost_price_cents, 1_200);
        assert!(!product.active);
    }

    #[test]
    fn test_public_product_hides_cost() {
        let product = sample_product();
        let json = serde_json::to_value(product.to_public()).unwrap();
        assert!(json.get("costPriceCents").is_none());
        assert_eq!(json["salePriceCents"], 2_500);
        assert_eq!(json["inStock"], true);
    }

    #[test]
    fn test_sale_type_serializes_as_type() {
        let sale = Sale {
            id: "s-1".to_string(),
            date: Utc::now(),
            subtotal_cents: 100,
            discount_cents: 0,
            total_cents: 100,
            cost_total_cents: 50,
            profit_cents: 50,
            sale_type: SaleType::Credit,
            items: vec![],
            customer_id: Some("c-1".to_string()),
            status: SaleStatus::Pending,
            payments: vec![],
            remaining_balance_cents: 100,
            installment_plan: None,
        };
        let json = serde_json::to_value(&sale).unwrap();
        assert_eq!(json["type"], "credit");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["remainingBalanceCents"], 100);
    }
}
