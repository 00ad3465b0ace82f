use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// `data-*` attributes keyed the way `HTMLElement.dataset` keys them (`data-editing-info` →
/// `editingInfo`).
pub type Dataset = BTreeMap<String, String>;

pub const EDITING_INFO: &str = "editingInfo";

pub fn dataset_key_from_attribute(name: &str) -> Option<String> {
    let rest = name.strip_prefix("data-")?;
    let mut key = String::with_capacity(rest.len());
    let mut upper = false;
    for ch in rest.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            key.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            key.push(ch);
        }
    }
    Some(key)
}

pub fn attribute_from_dataset_key(key: &str) -> String {
    let mut name = String::from("data-");
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            name.push('-');
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push(ch);
        }
    }
    name
}

pub fn dataset_from_attributes(attributes: &[(String, String)]) -> Dataset {
    attributes
        .iter()
        .filter_map(|(name, value)| Some((dataset_key_from_attribute(name)?, value.clone())))
        .collect()
}

/// Typed view of JSON stored under `dataset.editingInfo`.
pub fn read_metadata<T: DeserializeOwned>(dataset: &Dataset) -> Option<T> {
    let raw = dataset.get(EDITING_INFO)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(%err, raw = raw.as_str(), "ignoring undecodable editingInfo");
            None
        }
    }
}

pub fn write_metadata<T: Serialize>(dataset: &mut Dataset, metadata: &T) {
    if let Ok(raw) = serde_json::to_string(metadata) {
        dataset.insert(EDITING_INFO.to_string(), raw);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered_style_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unordered_style_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_list_style_from_level: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NumberingListType {
    Decimal = 1,
    DecimalDash = 2,
    DecimalParenthesis = 3,
    DecimalDoubleParenthesis = 4,
    LowerAlpha = 5,
    LowerAlphaParenthesis = 6,
    LowerAlphaDoubleParenthesis = 7,
    LowerAlphaDash = 8,
    UpperAlpha = 9,
    UpperAlphaParenthesis = 10,
    UpperAlphaDoubleParenthesis = 11,
    UpperAlphaDash = 12,
    LowerRoman = 13,
    LowerRomanParenthesis = 14,
    LowerRomanDoubleParenthesis = 15,
    LowerRomanDash = 16,
    UpperRoman = 17,
    UpperRomanParenthesis = 18,
    UpperRomanDoubleParenthesis = 19,
    UpperRomanDash = 20,
}

impl NumberingListType {
    /// The closest plain CSS `list-style-type`.
    pub fn css_list_style(self) -> &'static str {
        match self as u32 {
            1..=4 => "decimal",
            5..=8 => "lower-alpha",
            9..=12 => "upper-alpha",
            13..=16 => "lower-roman",
            _ => "upper-roman",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BulletListType {
    Disc = 1,
    Square = 2,
    Circle = 3,
    Dash = 4,
    LongArrow = 5,
    DoubleLongArrow = 6,
    ShortArrow = 7,
    UnfilledArrow = 8,
    Hyphen = 9,
}

impl BulletListType {
    pub fn css_list_style(self) -> &'static str {
        match self {
            BulletListType::Square => "square",
            BulletListType::Circle => "circle",
            _ => "disc",
        }
    }
}

pub const ENTITY_CLASS: &str = "_Entity";
const ENTITY_TYPE_PREFIX: &str = "_EType_";
const ENTITY_ID_PREFIX: &str = "_EId_";
const ENTITY_READONLY_PREFIX: &str = "_EReadonly_";

/// What the class list of an entity wrapper says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub entity_type: String,
    pub id: String,
    pub is_readonly: bool,
}

impl EntityInfo {
    pub fn parse<'a>(classes: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut is_entity = false;
        let mut info = EntityInfo {
            entity_type: String::new(),
            id: String::new(),
            is_readonly: false,
        };
        for class in classes {
            if class == ENTITY_CLASS {
                is_entity = true;
            } else if let Some(t) = class.strip_prefix(ENTITY_TYPE_PREFIX) {
                info.entity_type = t.to_string();
            } else if let Some(id) = class.strip_prefix(ENTITY_ID_PREFIX) {
                info.id = id.to_string();
            } else if let Some(flag) = class.strip_prefix(ENTITY_READONLY_PREFIX) {
                info.is_readonly = flag == "1";
            }
        }
        is_entity.then_some(info)
    }

    pub fn class_list(&self) -> String {
        let mut classes = vec![ENTITY_CLASS.to_string()];
        if !self.entity_type.is_empty() {
            classes.push(format!("{ENTITY_TYPE_PREFIX}{}", self.entity_type));
        }
        if !self.id.is_empty() {
            classes.push(format!("{ENTITY_ID_PREFIX}{}", self.id));
        }
        if self.is_readonly {
            classes.push(format!("{ENTITY_READONLY_PREFIX}1"));
        }
        classes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_keys_round_trip_through_attributes() {
        assert_eq!(
            dataset_key_from_attribute("data-editing-info").as_deref(),
            Some("editingInfo")
        );
        assert_eq!(attribute_from_dataset_key("editingInfo"), "data-editing-info");
        assert_eq!(dataset_key_from_attribute("class"), None);
    }

    #[test]
    fn list_metadata_encoding_is_stable() {
        let mut dataset = Dataset::new();
        write_metadata(
            &mut dataset,
            &ListMetadata {
                ordered_style_type: Some(3),
                unordered_style_type: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(
            dataset.get(EDITING_INFO).map(String::as_str),
            Some(r#"{"orderedStyleType":3,"unorderedStyleType":1}"#)
        );
        let read: ListMetadata = read_metadata(&dataset).unwrap();
        assert_eq!(read.ordered_style_type, Some(3));
    }

    #[test]
    fn broken_metadata_is_ignored() {
        let mut dataset = Dataset::new();
        dataset.insert(EDITING_INFO.to_string(), "{not json".to_string());
        assert_eq!(read_metadata::<ListMetadata>(&dataset), None);
    }

    #[test]
    fn entity_classes() {
        let info = EntityInfo::parse("_Entity _EType_video _EId_v1 _EReadonly_1".split(' ')).unwrap();
        assert_eq!(info.entity_type, "video");
        assert_eq!(info.id, "v1");
        assert!(info.is_readonly);
        assert_eq!(info.class_list(), "_Entity _EType_video _EId_v1 _EReadonly_1");
        assert!(EntityInfo::parse(["plain"]).is_none());
    }
}
