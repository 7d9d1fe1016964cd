// https://getstream.io/activity-feeds/docs/#notification-feeds

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use feed_ref::{ActivityId, UserId};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use serde_with::{serde_as, DefaultOnError, OneOrMany};
use std::{borrow::Cow, fmt};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("Failed to parse activity group from JSON: {0}")]
    ParseGroup(#[source] serde_json::Error),
    #[error("Failed to parse activity from JSON: {0}")]
    ParseActivity(#[source] serde_json::Error),
}

/// A batch of activities collapsed into one notification
/// ("3 people liked your post").
///
/// `activities` is ordered newest-first by the producer. Consumers trust the
/// ordering and never re-sort.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActivityGroup {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub group: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub verb: Option<Verb>,
    pub activities: Vec<Activity>,
    #[serde(alias = "isRead")]
    #[serde(default)]
    pub is_read: bool,
    #[serde(alias = "isSeen")]
    #[serde(default)]
    pub is_seen: bool,
}

impl ActivityGroup {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ModelError> {
        serde_json::from_value(value).map_err(ModelError::ParseGroup)
    }

    pub fn actor_count(&self) -> usize {
        self.activities.len()
    }

    pub fn latest(&self) -> Option<&Activity> {
        self.activities.first()
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Activity {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub id: Option<ActivityId>,
    pub verb: Verb,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub actor: Option<User>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub object: Option<ActivityObject>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub meta: Option<ActivityMeta>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub time: Option<ActivityTime>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub text: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub image: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub attachments: Option<Attachments>,
}

impl Activity {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ModelError> {
        serde_json::from_value(value).map_err(ModelError::ParseActivity)
    }

    pub fn meta(&self) -> Cow<ActivityMeta> {
        match &self.meta {
            Some(meta) => Cow::Borrowed(meta),
            None => Cow::Owned(ActivityMeta::default()),
        }
    }
}

/// Action-type tag of an activity.
///
/// The enumeration is closed over the verbs the product emits, with an
/// explicit open arm: unknown verbs keep their wire spelling so they can be
/// displayed and named in diagnostics instead of failing the whole group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Verb {
    Like,
    ActivityLike,
    PostReactionLike,
    Repost,
    Follow,
    Post,
    Comment,
    Reaction,
    Other(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Like => "like",
            Verb::ActivityLike => "activityLike",
            Verb::PostReactionLike => "postReactionLike",
            Verb::Repost => "repost",
            Verb::Follow => "follow",
            Verb::Post => "post",
            Verb::Comment => "comment",
            Verb::Reaction => "reaction",
            Verb::Other(verb) => verb.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Verb::Other(_))
    }
}

impl From<String> for Verb {
    fn from(value: String) -> Self {
        match value.as_str() {
            "like" => Verb::Like,
            "activityLike" => Verb::ActivityLike,
            "postReactionLike" => Verb::PostReactionLike,
            "repost" => Verb::Repost,
            "follow" => Verb::Follow,
            "post" => Verb::Post,
            "comment" => Verb::Comment,
            "reaction" => Verb::Reaction,
            _ => Verb::Other(value),
        }
    }
}

impl From<Verb> for String {
    fn from(value: Verb) -> String {
        value.as_str().to_string()
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An activity's object: either a raw original-id reference or a nested
/// activity carrying its own verb.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ActivityObject {
    Ref(String),
    Nested(Box<Activity>),
}

impl ActivityObject {
    pub fn verb(&self) -> Option<&Verb> {
        match self {
            ActivityObject::Ref(_) => None,
            ActivityObject::Nested(activity) => Some(&activity.verb),
        }
    }

    pub fn as_ref_str(&self) -> Option<&str> {
        match self {
            ActivityObject::Ref(reference) => Some(reference.as_str()),
            ActivityObject::Nested(_) => None,
        }
    }

    pub fn nested(&self) -> Option<&Activity> {
        match self {
            ActivityObject::Ref(_) => None,
            ActivityObject::Nested(activity) => Some(activity),
        }
    }
}

/// Ownership markers attached to an activity. All keys optional; absence is
/// the normal case. Producers serialize the ids as strings or numbers
/// interchangeably, which `UserId`/`ActivityId` canonicalize on ingestion.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ActivityMeta {
    #[serde_as(deserialize_as = "DefaultOnError<Option<OneOrMany<_>>>")]
    #[serde(default)]
    pub build_owners: Option<Vec<UserId>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub garage_owner: Option<UserId>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub reaction_owner: Option<UserId>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub activity_owner: Option<UserId>,
    #[serde_as(deserialize_as = "DefaultOnError<Option<OneOrMany<_>>>")]
    #[serde(default)]
    pub users: Option<Vec<UserId>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub activity_owner_label: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub original_id: Option<ActivityId>,
}

impl ActivityMeta {
    pub fn build_owned_by(&self, viewer: &UserId) -> bool {
        self.build_owners
            .as_ref()
            .map(|owners| owners.contains(viewer))
            .unwrap_or(false)
    }

    pub fn garage_owned_by(&self, viewer: &UserId) -> bool {
        self.garage_owner.as_ref() == Some(viewer)
    }

    pub fn reaction_owned_by(&self, viewer: &UserId) -> bool {
        self.reaction_owner.as_ref() == Some(viewer)
    }

    pub fn activity_owned_by(&self, viewer: &UserId) -> bool {
        self.activity_owner.as_ref() == Some(viewer)
    }

    pub fn mentions(&self, viewer: &UserId) -> bool {
        self.users
            .as_ref()
            .map(|users| users.contains(viewer))
            .unwrap_or(false)
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct User {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub data: UserData,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UserData {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub handle: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(rename = "profileImage")]
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.data.name.as_deref().unwrap_or("")
    }
}

/// Substitutes the default placeholder user whenever actor data is missing,
/// so downstream rendering never null-checks.
pub fn user_or_default(user: Option<&User>) -> Cow<'_, User> {
    match user {
        Some(user) => Cow::Borrowed(user),
        None => Cow::Owned(User::default()),
    }
}

/// Timestamp as produced by the feed: ISO-8601 string or epoch number.
/// Display only; kept in wire form and parsed on demand.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActivityTime {
    Iso(String),
    Epoch(i64),
}

impl ActivityTime {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ActivityTime::Iso(string) => DateTime::parse_from_rfc3339(string)
                .map(|datetime| datetime.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // feed timestamps frequently omit the timezone suffix
                    NaiveDateTime::parse_from_str(string, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                }),
            ActivityTime::Epoch(number) => {
                if number.abs() >= 1_000_000_000_000 {
                    Utc.timestamp_millis_opt(*number).single()
                } else {
                    Utc.timestamp_opt(*number, 0).single()
                }
            }
        }
    }
}

// https://serde.rs/string-or-struct.html
impl<'de> Deserialize<'de> for ActivityTime {
    fn deserialize<D>(deserializer: D) -> Result<ActivityTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ActivityTimeVisitor;

        impl<'de> Visitor<'de> for ActivityTimeVisitor {
            type Value = ActivityTime;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("ISO-8601 string or epoch number")
            }

            fn visit_str<E>(self, value: &str) -> Result<ActivityTime, E>
            where
                E: de::Error,
            {
                Ok(ActivityTime::Iso(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<ActivityTime, E>
            where
                E: de::Error,
            {
                Ok(ActivityTime::Epoch(value as i64))
            }

            fn visit_i64<E>(self, value: i64) -> Result<ActivityTime, E>
            where
                E: de::Error,
            {
                Ok(ActivityTime::Epoch(value))
            }

            fn visit_f64<E>(self, value: f64) -> Result<ActivityTime, E>
            where
                E: de::Error,
            {
                Ok(ActivityTime::Epoch(value as i64))
            }
        }

        deserializer.deserialize_any(ActivityTimeVisitor)
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Attachments {
    #[serde_as(as = "Option<DefaultOnError<OneOrMany<_>>>")]
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde_as(as = "Option<DefaultOnError<OneOrMany<_>>>")]
    #[serde(default)]
    pub files: Option<Vec<FileAttachment>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub og: Option<OpenGraph>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FileAttachment {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub url: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(alias = "mimeType")]
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OpenGraph {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub title: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub url: Option<String>,
}

/// A comment reaction on an activity.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Comment {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: CommentData,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub created_at: Option<ActivityTime>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CommentData {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_round_trip() {
        let verb: Verb = serde_json::from_value(json!("activityLike")).unwrap();
        assert_eq!(verb, Verb::ActivityLike);
        assert_eq!(serde_json::to_value(&verb).unwrap(), json!("activityLike"));
    }

    #[test]
    fn test_unknown_verb_keeps_wire_spelling() {
        let verb: Verb = serde_json::from_value(json!("frobnicate")).unwrap();
        assert_eq!(verb, Verb::Other("frobnicate".to_string()));
        assert!(!verb.is_known());
        assert_eq!(verb.as_str(), "frobnicate");
    }

    #[test]
    fn test_object_string_or_nested() {
        let activity = Activity::from_json(json!({
            "verb": "like",
            "object": { "verb": "post", "id": 42 }
        }))
        .unwrap();
        let object = activity.object.as_ref().unwrap();
        assert_eq!(object.verb(), Some(&Verb::Post));

        let activity = Activity::from_json(json!({
            "verb": "comment",
            "object": "abc123"
        }))
        .unwrap();
        let object = activity.object.as_ref().unwrap();
        assert_eq!(object.as_ref_str(), Some("abc123"));
    }

    #[test]
    fn test_meta_id_coercion() {
        let meta: ActivityMeta = serde_json::from_value(json!({
            "garage_owner": "7",
            "build_owners": [1, "2"],
            "users": 3
        }))
        .unwrap();
        let viewer = UserId::from(7u64);
        assert!(meta.garage_owned_by(&viewer));
        assert!(meta.build_owned_by(&UserId::from(2u64)));
        assert!(meta.mentions(&UserId::from(3u64)));
    }

    #[test]
    fn test_malformed_meta_degrades() {
        let meta: ActivityMeta = serde_json::from_value(json!({
            "build_owners": { "bogus": true },
            "activity_owner_label": 12
        }))
        .unwrap();
        assert!(meta.build_owners.is_none());
        assert!(meta.activity_owner_label.is_none());
    }

    #[test]
    fn test_group_read_flag_aliases() {
        let group = ActivityGroup::from_json(json!({
            "activities": [{ "verb": "follow" }],
            "isRead": true
        }))
        .unwrap();
        assert!(group.is_read);
        assert_eq!(group.actor_count(), 1);
    }

    #[test]
    fn test_time_string_and_epoch() {
        let time: ActivityTime = serde_json::from_value(json!("2019-04-29T09:45:03.173")).unwrap();
        let datetime = time.to_datetime().unwrap();
        assert_eq!(datetime.timestamp(), 1556531103);

        let time: ActivityTime = serde_json::from_value(json!(1556531103)).unwrap();
        assert_eq!(time.to_datetime().unwrap().timestamp(), 1556531103);

        let time: ActivityTime = serde_json::from_value(json!(1556531103000i64)).unwrap();
        assert_eq!(time.to_datetime().unwrap().timestamp(), 1556531103);
    }

    #[test]
    fn test_user_or_default() {
        let substituted = user_or_default(None);
        assert_eq!(substituted.display_name(), "");
        assert!(substituted.data.profile_image.is_none());
    }

    #[test]
    fn test_actor_missing_is_tolerated() {
        let activity = Activity::from_json(json!({
            "verb": "like",
            "actor": null
        }))
        .unwrap();
        assert!(activity.actor.is_none());
    }
}
