use hashtag_regex::HASHTAG_RE_STRING;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::convert::TryFrom;
use std::fmt;
use thiserror::Error as ThisError;
use urlencoding::encode;

#[derive(Clone, Debug, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
}

/// Canonical user identifier.
///
/// Upstream feeds serialize user ids as JSON strings or numbers,
/// interchangeably. Both forms deserialize into the same canonical string so
/// every ownership comparison downstream is a plain equality check.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        UserId(value.to_string())
    }
}

impl From<&UserId> for String {
    fn from(value: &UserId) -> String {
        value.0.clone()
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<UserId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UserIdVisitor;

        impl<'de> Visitor<'de> for UserIdVisitor {
            type Value = UserId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string or number")
            }

            fn visit_str<E>(self, value: &str) -> Result<UserId, E>
            where
                E: de::Error,
            {
                Ok(UserId(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<UserId, E>
            where
                E: de::Error,
            {
                Ok(UserId(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<UserId, E>
            where
                E: de::Error,
            {
                Ok(UserId(value.to_string()))
            }

            fn visit_f64<E>(self, value: f64) -> Result<UserId, E>
            where
                E: de::Error,
            {
                Ok(UserId(value.to_string()))
            }
        }

        deserializer.deserialize_any(UserIdVisitor)
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Opaque activity identifier, string or number on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn to_page_url(&self) -> String {
        format!("/activity/{}", encode(self.0.as_str()))
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(value: &str) -> Self {
        ActivityId(value.to_string())
    }
}

impl From<&ActivityId> for String {
    fn from(value: &ActivityId) -> String {
        value.0.clone()
    }
}

impl<'de> Deserialize<'de> for ActivityId {
    fn deserialize<D>(deserializer: D) -> Result<ActivityId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ActivityIdVisitor;

        impl<'de> Visitor<'de> for ActivityIdVisitor {
            type Value = ActivityId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string or number")
            }

            fn visit_str<E>(self, value: &str) -> Result<ActivityId, E>
            where
                E: de::Error,
            {
                Ok(ActivityId(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<ActivityId, E>
            where
                E: de::Error,
            {
                Ok(ActivityId(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<ActivityId, E>
            where
                E: de::Error,
            {
                Ok(ActivityId(value.to_string()))
            }
        }

        deserializer.deserialize_any(ActivityIdVisitor)
    }
}

impl Serialize for ActivityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub struct HandleRef(String);

impl HandleRef {
    // From string that starts with @
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Handle",
                input: string,
            })
        } else {
            Ok(Self(Self::parse_handle(string.as_str())))
        }
    }

    pub fn handle(&self) -> &str {
        self.0.as_str()
    }

    pub fn to_string(&self) -> String {
        format!("@{}", self.0)
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex =
                Regex::new("^@(?P<handle>[A-Za-z0-9_][A-Za-z0-9_-]*)$").unwrap();
        }
        &*RE
    }

    pub fn multi_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new("@(?P<handle>[A-Za-z0-9_][A-Za-z0-9_-]*)").unwrap();
        }
        &*RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn to_page_url(&self) -> String {
        format!("/user/{}", encode(self.0.as_str()))
    }

    fn parse_handle(string: &str) -> String {
        let regex = Self::single_regex();
        let caps = regex.captures(string).unwrap();
        caps.name("handle").unwrap().as_str().to_string()
    }
}

impl TryFrom<String> for HandleRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HandleRef::from_string(value)
    }
}

impl From<&HandleRef> for String {
    fn from(value: &HandleRef) -> String {
        value.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub struct HashtagRef(String);

impl HashtagRef {
    // From string that starts with #
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Hashtag",
                input: string,
            })
        } else {
            Ok(Self(string))
        }
    }

    pub fn tag(&self) -> String {
        self.parse_tag()
    }

    pub fn to_string(&self) -> String {
        self.0.clone()
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(format!("^{}$", HASHTAG_RE_STRING.to_string()).as_str()).unwrap();
        }
        &*RE
    }

    pub fn multi_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(&HASHTAG_RE_STRING).unwrap();
        }
        &*RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn to_page_url(&self) -> String {
        let tag = self.parse_tag();
        let urlsafe_tag = encode(tag.as_str());
        format!("/hashtag/{}", urlsafe_tag)
    }

    fn parse_tag(&self) -> String {
        let regex = Self::single_regex();
        let caps = regex.captures(self.0.as_str()).unwrap();
        caps.name("tag").unwrap().as_str().to_string()
    }
}

impl TryFrom<String> for HashtagRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HashtagRef::from_string(value)
    }
}

impl From<&HashtagRef> for String {
    fn from(value: &HashtagRef) -> String {
        value.to_string()
    }
}

/// `+build-handle` reference, the feed's inline syntax for tagging a build.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub struct BuildRef(String);

impl BuildRef {
    // From string that starts with +
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Build",
                input: string,
            })
        } else {
            Ok(Self(Self::parse_build(string.as_str())))
        }
    }

    pub fn handle(&self) -> &str {
        self.0.as_str()
    }

    pub fn to_string(&self) -> String {
        format!("+{}", self.0)
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^\+(?P<build>[A-Za-z0-9_][A-Za-z0-9_-]*)$").unwrap();
        }
        &*RE
    }

    pub fn multi_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"\+(?P<build>[A-Za-z0-9_][A-Za-z0-9_-]*)").unwrap();
        }
        &*RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn to_page_url(&self) -> String {
        format!("/build/{}", encode(self.0.as_str()))
    }

    fn parse_build(string: &str) -> String {
        let regex = Self::single_regex();
        let caps = regex.captures(string).unwrap();
        caps.name("build").unwrap().as_str().to_string()
    }
}

impl TryFrom<String> for BuildRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BuildRef::from_string(value)
    }
}

impl From<&BuildRef> for String {
    fn from(value: &BuildRef) -> String {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_string_and_number() {
        let from_string: UserId = serde_json::from_value(serde_json::json!("7")).unwrap();
        let from_number: UserId = serde_json::from_value(serde_json::json!(7)).unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(from_number.as_str(), "7");
    }

    #[test]
    fn test_user_id_serializes_as_string() {
        let id: UserId = serde_json::from_value(serde_json::json!(42)).unwrap();
        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(value, serde_json::json!("42"));
    }

    #[test]
    fn test_activity_id_accepts_number() {
        let id: ActivityId = serde_json::from_value(serde_json::json!(123)).unwrap();
        assert_eq!(id.as_str(), "123");
    }

    #[test]
    fn test_is_handle() {
        assert!(HandleRef::is_match("@crank_case"));
        assert!(HandleRef::is_match("@v8-fiend"));
        assert!(!HandleRef::is_match("crank_case"));
        assert!(!HandleRef::is_match("@"));
    }

    #[test]
    fn test_handle_page_url() {
        let handle = HandleRef::from_string("@crank_case".to_string()).unwrap();
        assert_eq!(handle.to_page_url(), "/user/crank_case");
        assert_eq!(handle.to_string(), "@crank_case");
    }

    #[test]
    fn test_is_build() {
        assert!(BuildRef::is_match("+resto-mod-240z"));
        assert!(!BuildRef::is_match("resto-mod-240z"));
    }

    #[test]
    fn test_build_page_url() {
        let build = BuildRef::from_string("+resto-mod-240z".to_string()).unwrap();
        assert_eq!(build.to_page_url(), "/build/resto-mod-240z");
    }

    #[test]
    fn test_hashtag_page_url() {
        let hashtag = HashtagRef::from_string("#vintage".to_string()).unwrap();
        assert_eq!(hashtag.to_page_url(), "/hashtag/vintage");
    }

    #[test]
    fn test_bad_format_error() {
        let err = HandleRef::from_string("not-a-handle".to_string()).unwrap_err();
        assert!(matches!(err, RefError::BadFormat { ref_type: "Handle", .. }));
    }
}
