//! Persistent classes shared by the unit tests

use palimpsest_macros::Persistent;
use palimpsest_model::EntityKey;

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Address")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Person")]
pub struct Person {
    #[persistent(id)]
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub nickname: Option<String>,
    #[persistent(embedded)]
    pub address: Option<Address>,
    #[persistent(reference = "Company")]
    pub employer: Option<EntityKey>,
    pub tags: Vec<String>,
    #[persistent(not_audited)]
    pub login_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Employee", extends = "Person")]
pub struct Employee {
    #[persistent(id)]
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub nickname: Option<String>,
    #[persistent(embedded)]
    pub address: Option<Address>,
    #[persistent(reference = "Company")]
    pub employer: Option<EntityKey>,
    pub tags: Vec<String>,
    #[persistent(not_audited)]
    pub login_count: i64,
    pub salary: i64,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Company")]
pub struct Company {
    #[persistent(id)]
    pub id: i64,
    pub name: String,
}

/// Component holding a relation
#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Office")]
pub struct Office {
    pub building: Option<String>,
    #[persistent(reference = "Company")]
    pub landlord: Option<EntityKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Branch")]
pub struct Branch {
    #[persistent(id)]
    pub id: i64,
    #[persistent(embedded)]
    pub office: Option<Office>,
}

/// Component without a constructor
#[derive(Debug, Clone, PartialEq, Persistent)]
#[persistent(entity = "Coordinates", no_default)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Entity whose superclass is not audited
#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Contractor", extends = "Vendor")]
pub struct Contractor {
    #[persistent(id)]
    pub id: i64,
    pub rate: i64,
}
