//! Asset manifests and the on-disk file pairs they come from.

use crate::grid::GlobalIndex;
use crate::item::Locator;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Kind of artifact handed to a storage provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Image,
    Metadata,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Image => "image/png",
            Self::Metadata => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Metadata => "json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Strip leading zeros from an item index string.
///
/// An all-zero string normalizes to `"0"` so item zero stays addressable.
pub fn normalize_item_key(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() && !raw.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub address: String,
    pub share: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(rename = "type")]
    pub content_type: String,
    pub uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestProperties {
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata document published next to each image.
///
/// Fields not modelled here are kept in `extra` and written back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub seller_fee_basis_points: u16,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub properties: ManifestProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetManifest {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let manifest: Self =
            serde_json::from_slice(data).map_err(|e| Error::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidManifest("name is empty".to_string()));
        }
        if self.seller_fee_basis_points > 10_000 {
            return Err(Error::InvalidManifest(format!(
                "seller_fee_basis_points {} exceeds 10000",
                self.seller_fee_basis_points
            )));
        }
        let creators = &self.properties.creators;
        if !creators.is_empty() {
            let total: u32 = creators.iter().map(|c| u32::from(c.share)).sum();
            if total != 100 {
                return Err(Error::InvalidManifest(format!(
                    "creator shares sum to {total}, expected 100"
                )));
            }
        }
        Ok(())
    }

    /// Index string embedded after `#` in the name, normalized.
    pub fn index_key(&self) -> Option<String> {
        self.name
            .split('#')
            .nth(1)
            .map(|raw| normalize_item_key(raw.trim()))
    }

    pub fn global_index(&self) -> Result<GlobalIndex> {
        let key = self
            .index_key()
            .ok_or_else(|| Error::InvalidManifest(format!("no index in name {:?}", self.name)))?;
        key.parse()
            .map(GlobalIndex)
            .map_err(|_| Error::InvalidManifest(format!("bad index in name {:?}", self.name)))
    }

    /// Copy of this manifest pointing at an uploaded image.
    pub fn with_image(&self, link: &Locator) -> Self {
        let mut updated = self.clone();
        updated.image = link.to_string();
        updated.properties.files = vec![ManifestFile {
            content_type: ContentType::Image.mime().to_string(),
            uri: link.to_string(),
        }];
        updated
    }
}

/// An image and its metadata document sharing one item key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePair {
    pub key: GlobalIndex,
    pub image: PathBuf,
    pub metadata: PathBuf,
    /// Combined size of both files in bytes.
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "name": "Land #000042",
            "symbol": "LAND",
            "seller_fee_basis_points": 500,
            "image": "42.png",
            "attributes": [{"trait_type": "terrain", "value": "hills"}],
            "properties": {
                "category": "image",
                "creators": [{"address": "creator-a", "share": 60}, {"address": "creator-b", "share": 40}],
                "files": [{"type": "image/png", "uri": "42.png"}]
            }
        })
    }

    #[test]
    fn test_normalize_item_key() {
        assert_eq!(normalize_item_key("000042"), "42");
        assert_eq!(normalize_item_key("42"), "42");
        assert_eq!(normalize_item_key("100"), "100");
        assert_eq!(normalize_item_key("0000"), "0");
        assert_eq!(normalize_item_key(""), "");
    }

    #[test]
    fn test_manifest_preserves_unknown_fields() {
        let data = serde_json::to_vec(&sample()).unwrap();
        let manifest = AssetManifest::from_slice(&data).unwrap();
        assert_eq!(manifest.global_index().unwrap(), GlobalIndex(42));

        let back: Value = serde_json::from_slice(&manifest.to_vec().unwrap()).unwrap();
        assert_eq!(back["attributes"], sample()["attributes"]);
        assert_eq!(back["properties"]["category"], "image");
    }

    #[test]
    fn test_with_image_rewrites_references() {
        let manifest: AssetManifest = serde_json::from_value(sample()).unwrap();
        let link = Locator::new("https://gateway.test/abc");
        let updated = manifest.with_image(&link);

        assert_eq!(updated.image, "https://gateway.test/abc");
        assert_eq!(
            updated.properties.files,
            vec![ManifestFile {
                content_type: "image/png".to_string(),
                uri: "https://gateway.test/abc".to_string(),
            }]
        );
        assert_eq!(updated.properties.creators, manifest.properties.creators);
        assert_eq!(manifest.image, "42.png", "original untouched");
    }

    #[test]
    fn test_manifest_validation() {
        let mut value = sample();
        value["properties"]["creators"][0]["share"] = json!(10);
        let data = serde_json::to_vec(&value).unwrap();
        assert!(AssetManifest::from_slice(&data).is_err());

        let mut value = sample();
        value["seller_fee_basis_points"] = json!(10_001);
        let data = serde_json::to_vec(&value).unwrap();
        assert!(AssetManifest::from_slice(&data).is_err());

        let mut value = sample();
        value["name"] = json!("Land");
        let manifest: AssetManifest = serde_json::from_value(value).unwrap();
        assert!(manifest.global_index().is_err());
    }
}
