//! # Property Data Model
//!
//! Types describing a rentable property as the bot collects it, and the payload
//! sent to the web application when the property is created.
//!
//! ## Core Concepts
//!
//! - **PropertyKind**: coarse category hint, warehouse or premise
//! - **PropertyDraft**: the fields accumulated by the creation wizard
//! - **ParsedPropertyBlock**: the fields recognised in a single free-form message
//! - **CreatePropertyRequest**: the JSON body of the Property-Create call

use serde::{Deserialize, Serialize};

/// Currency attached to properties created from the bot
pub const DEFAULT_CURRENCY: &str = "USD";

/// Lease term attached to properties created from the bot
pub const DEFAULT_TERM: &str = "по договоренности";

/// Description used when the admin did not provide one
pub const DESCRIPTION_PLACEHOLDER: &str = "Без описания";

/// Coarse category of a property, inferred from the first wizard input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Warehouse,
    #[default]
    Premise,
}

/// Opaque reference to a photo stored by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Property fields recognised in a single labelled block of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPropertyBlock {
    pub city: String,
    pub address: String,
    pub area_m2: f64,
    pub monthly_total: f64,
    pub rent_rate: f64,
    pub service_rate: f64,
    pub description: String,
}

/// Partially collected property, filled step by step by the wizard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub city: String,
    pub address: String,
    pub area_m2: f64,
    pub monthly_total: f64,
    pub rent_rate: f64,
    pub service_rate: f64,
    pub description: String,
    /// Photos in the order they were sent; the order becomes the sort order
    pub photo_refs: Vec<MediaRef>,
}

impl PropertyDraft {
    /// Overwrite every scalar field with the values of a parsed block
    pub fn apply_block(&mut self, block: ParsedPropertyBlock) {
        self.city = block.city;
        self.address = block.address;
        self.area_m2 = block.area_m2;
        self.monthly_total = block.monthly_total;
        self.rent_rate = block.rent_rate;
        self.service_rate = block.service_rate;
        self.description = block.description;
    }

    /// Title shown in the catalog
    pub fn title(&self, kind: PropertyKind) -> String {
        match kind {
            PropertyKind::Warehouse => format!("Склад — {} — {}", self.city, self.address),
            PropertyKind::Premise => format!("{} — {}", self.city, self.address),
        }
    }

    /// Location line shown in the catalog
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.address)
    }

    /// Build the Property-Create payload for this draft
    pub fn to_create_request(&self, kind: PropertyKind) -> CreatePropertyRequest {
        CreatePropertyRequest {
            title: self.title(kind),
            location: self.location(),
            area_m2: self.area_m2,
            rent_rate: self.rent_rate,
            service_rate: self.service_rate,
            currency: DEFAULT_CURRENCY.to_string(),
            monthly_total: self.monthly_total,
            term: DEFAULT_TERM.to_string(),
            description: self.description.clone(),
            visible_to_client: true,
        }
    }
}

/// Body of the Property-Create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub title: String,
    pub location: String,
    #[serde(rename = "areaM2")]
    pub area_m2: f64,
    pub rent_rate: f64,
    pub service_rate: f64,
    pub currency: String,
    pub monthly_total: f64,
    pub term: String,
    pub description: String,
    pub visible_to_client: bool,
}

/// Response of the Property-Create call
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropertyResponse {
    pub item: CreatedProperty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProperty {
    pub id: String,
}

/// A downloaded photo ready to be attached to a property
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
