use serde::{Deserialize, Serialize};

/// W3C DID-core document shape, as both `peer::generate` produces it and
/// `web::resolve` parses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "publicKey")]
    pub public_key: Vec<PublicKeyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<AuthenticationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<ServiceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "publicKeyBase58")]
    pub public_key_base58: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ethereumAddress")]
    pub ethereum_address: Option<String>,
}

/// `authentication[]` entries are heterogeneous in the wild: either a bare
/// `"#shortKeyId"` reference string, or an embedded key object. Serde peeks
/// at the JSON shape (string vs. object) to pick the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthenticationEntry {
    Reference(String),
    Embedded {
        #[serde(rename = "type")]
        type_: String,
        #[serde(rename = "publicKey")]
        public_key: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationSection {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub grant: Vec<String>,
    pub when: RuleCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub id: String,
}
