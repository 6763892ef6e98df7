//! Hand-written resources for unit tests (the derive macro lives downstream).

use crate::resource::{Join, NoParent, Patch, Resource, Scope};
use crate::schema::{Issues, Validate, ValidationError};
use serde::{Deserialize, Serialize};

pub const REGION_ID: &str = "6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2c";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
}

impl Region {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RegionPatch {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
        }
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: None,
        }
    }
}

impl Patch<Region> for RegionPatch {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn merge_into(&self, target: &mut Region) {
        if let Some(id) = &self.id {
            target.id.clone_from(id);
        }
        if let Some(name) = &self.name {
            target.name.clone_from(name);
        }
    }

    fn into_record(self) -> Region {
        Region {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
        }
    }

    fn from_record(record: &Region) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: Some(record.name.clone()),
        }
    }

    fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id.is_some() {
            fields.push("id");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        fields
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single("", "Expected an object"));
        };
        let mut issues = Issues::default();
        let mut patch = Self::default();
        if let Some(raw) = object.get("id").filter(|v| !v.is_null()) {
            match serde_json::from_value(raw.clone()) {
                Ok(v) => patch.id = Some(v),
                Err(e) => issues.push("id", format!("Invalid id: {e}")),
            }
        }
        if let Some(raw) = object.get("name").filter(|v| !v.is_null()) {
            match serde_json::from_value(raw.clone()) {
                Ok(v) => patch.name = Some(v),
                Err(e) => issues.push("name", format!("Invalid name: {e}")),
            }
        }
        issues.into_result()?;
        Ok(patch)
    }
}

impl Resource for Region {
    type Patch = RegionPatch;
    type Parent = NoParent;

    const PLURAL: &'static str = "regions";
    const SINGULAR: &'static str = "region";
    const TABLE: &'static str = "regions";
    const SCOPE: Scope = Scope::Shared;
    const COLUMNS: &'static [&'static str] = &["id", "name"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const GENERATED: &'static [&'static str] = &[];
    const JOIN: Option<Join> = None;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
    }

    fn owner(&self) -> Option<&str> {
        None
    }
}

impl Validate for Region {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub region_id: String,
    pub user_id: String,
}

impl Hub {
    pub fn new(id: &str, name: &str, region_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region_id: region_id.to_string(),
            user_id: String::new(),
        }
    }

    pub fn owned_by(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Patch<Hub> for HubPatch {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn merge_into(&self, target: &mut Hub) {
        if let Some(id) = &self.id {
            target.id.clone_from(id);
        }
        if let Some(name) = &self.name {
            target.name.clone_from(name);
        }
        if let Some(region_id) = &self.region_id {
            target.region_id.clone_from(region_id);
        }
        if let Some(user_id) = &self.user_id {
            target.user_id.clone_from(user_id);
        }
    }

    fn into_record(self) -> Hub {
        Hub {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            region_id: self.region_id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
        }
    }

    fn from_record(record: &Hub) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: Some(record.name.clone()),
            region_id: Some(record.region_id.clone()),
            user_id: Some(record.user_id.clone()),
        }
    }

    fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id.is_some() {
            fields.push("id");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        if self.region_id.is_some() {
            fields.push("region_id");
        }
        if self.user_id.is_some() {
            fields.push("user_id");
        }
        fields
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single("", "Expected an object"));
        };
        let mut issues = Issues::default();
        let mut patch = Self::default();
        for (key, raw) in object {
            if raw.is_null() {
                continue;
            }
            let parsed: Result<String, _> = serde_json::from_value(raw.clone());
            match (key.as_str(), parsed) {
                ("id", Ok(v)) => patch.id = Some(v),
                ("name", Ok(v)) => patch.name = Some(v),
                ("region_id", Ok(v)) => patch.region_id = Some(v),
                ("id" | "name" | "region_id", Err(e)) => {
                    issues.push(key.clone(), format!("Invalid {key}: {e}"));
                },
                _ => {},
            }
        }
        issues.into_result()?;
        Ok(patch)
    }
}

impl Resource for Hub {
    type Patch = HubPatch;
    type Parent = Region;

    const PLURAL: &'static str = "hubs";
    const SINGULAR: &'static str = "hub";
    const TABLE: &'static str = "hubs";
    const SCOPE: Scope = Scope::Owned { column: "user_id" };
    const COLUMNS: &'static [&'static str] = &["id", "name", "region_id", "user_id"];
    const REQUIRED: &'static [&'static str] = &["name", "region_id"];
    const GENERATED: &'static [&'static str] = &["user_id"];
    const JOIN: Option<Join> = Some(Join {
        table: "regions",
        foreign_key: "region_id",
        field: "region",
    });

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name && self.region_id == other.region_id
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl Validate for Hub {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
        issues.uuid("region_id", &self.region_id);
    }
}
