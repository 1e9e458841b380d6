//! Entity families and their capability descriptors.
//!
//! The five per-family copies of the original data layer collapse into one
//! engine parameterized by a [`FamilyDescriptor`]: which table the family
//! lives in, which normalizer variant it matches with, which secondary key
//! (if any) boosts find-or-create recall, and which partner family shares its
//! name namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The entity families managed by the identity engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Family {
    /// Payment accounts (cash, bank cards, wallets).
    Account,
    /// Customers (receivable counterparties).
    Customer,
    /// Suppliers (payable counterparties).
    Supplier,
    /// Catalog items.
    Sku,
    /// Physical warehouses.
    Warehouse,
    /// Storage locations inside one warehouse.
    Location,
}

impl Family {
    /// All families, in table order.
    pub const ALL: [Self; 6] = [
        Self::Account,
        Self::Customer,
        Self::Supplier,
        Self::Sku,
        Self::Warehouse,
        Self::Location,
    ];

    /// The backing table name for this family.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::Customer => "customers",
            Self::Supplier => "suppliers",
            Self::Sku => "skus",
            Self::Warehouse => "warehouses",
            Self::Location => "locations",
        }
    }

    /// The capability descriptor for this family.
    #[must_use]
    pub fn descriptor(self) -> &'static FamilyDescriptor {
        &DESCRIPTORS[self as usize]
    }

    /// The families whose names are checked jointly for duplicates.
    ///
    /// Customers and suppliers share one namespace (either side can be
    /// flagged to also behave as the other); every other family is checked
    /// against itself only.
    #[must_use]
    pub const fn namespace_group(self) -> &'static [Self] {
        match self {
            Self::Customer => &[Self::Customer, Self::Supplier],
            Self::Supplier => &[Self::Supplier, Self::Customer],
            Self::Account => &[Self::Account],
            Self::Sku => &[Self::Sku],
            Self::Warehouse => &[Self::Warehouse],
            Self::Location => &[Self::Location],
        }
    }
}

impl TryFrom<String> for Family {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        Ok(if value.eq_ignore_ascii_case("account") {
            Self::Account
        } else if value.eq_ignore_ascii_case("customer") {
            Self::Customer
        } else if value.eq_ignore_ascii_case("supplier") {
            Self::Supplier
        } else if value.eq_ignore_ascii_case("sku") {
            Self::Sku
        } else if value.eq_ignore_ascii_case("warehouse") {
            Self::Warehouse
        } else if value.eq_ignore_ascii_case("location") {
            Self::Location
        } else {
            return Err(format!(
                "unknown entity family: {value}. Expected one of account, customer, supplier, sku, warehouse, location"
            ));
        })
    }
}

impl From<Family> for String {
    fn from(value: Family) -> Self {
        match value {
            Family::Account => "account".to_string(),
            Family::Customer => "customer".to_string(),
            Family::Supplier => "supplier".to_string(),
            Family::Sku => "sku".to_string(),
            Family::Warehouse => "warehouse".to_string(),
            Family::Location => "location".to_string(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Customer => write!(f, "customer"),
            Self::Supplier => write!(f, "supplier"),
            Self::Sku => write!(f, "sku"),
            Self::Warehouse => write!(f, "warehouse"),
            Self::Location => write!(f, "location"),
        }
    }
}

/// Secondary match key used by find-or-create after name matching fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryKey {
    /// No secondary key for this family.
    None,
    /// Tax registration number equality.
    TaxNumber,
    /// Trailing card-number suffix extracted from the display name.
    CardSuffix,
    /// Catalog item code equality.
    ItemCode,
}

/// Per-family capability descriptor driving the generic engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDescriptor {
    /// The family this descriptor belongs to.
    pub family: Family,

    /// Backing table name.
    pub table: &'static str,

    /// Whether find-or-create also matches on the loose, legal-suffix
    /// stripping normalizer. Recall only; never used to raise conflicts.
    pub heuristic_names: bool,

    /// Secondary key consulted when name matching finds nothing.
    pub secondary_key: SecondaryKey,

    /// Partner family sharing this family's name namespace, if any.
    pub partner: Option<Family>,

    /// Whether merge scope is one warehouse rather than the whole tenant.
    pub warehouse_scoped: bool,
}

/// Indexed by `Family as usize`.
static DESCRIPTORS: [FamilyDescriptor; 6] = [
    FamilyDescriptor {
        family: Family::Account,
        table: "accounts",
        heuristic_names: false,
        secondary_key: SecondaryKey::CardSuffix,
        partner: None,
        warehouse_scoped: false,
    },
    FamilyDescriptor {
        family: Family::Customer,
        table: "customers",
        heuristic_names: true,
        secondary_key: SecondaryKey::TaxNumber,
        partner: Some(Family::Supplier),
        warehouse_scoped: false,
    },
    FamilyDescriptor {
        family: Family::Supplier,
        table: "suppliers",
        heuristic_names: true,
        secondary_key: SecondaryKey::TaxNumber,
        partner: Some(Family::Customer),
        warehouse_scoped: false,
    },
    FamilyDescriptor {
        family: Family::Sku,
        table: "skus",
        heuristic_names: false,
        secondary_key: SecondaryKey::ItemCode,
        partner: None,
        warehouse_scoped: false,
    },
    FamilyDescriptor {
        family: Family::Warehouse,
        table: "warehouses",
        heuristic_names: false,
        secondary_key: SecondaryKey::None,
        partner: None,
        warehouse_scoped: false,
    },
    FamilyDescriptor {
        family: Family::Location,
        table: "locations",
        heuristic_names: false,
        secondary_key: SecondaryKey::None,
        partner: None,
        warehouse_scoped: true,
    },
];
