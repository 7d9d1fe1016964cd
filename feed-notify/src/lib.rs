use feed_i18n::Translate;
use feed_model::{user_or_default, Activity, ActivityGroup, ActivityObject, User, Verb};
use feed_ref::{ActivityId, UserId};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error as ThisError;

/// Translation key catalog for notification headlines.
///
/// The keys are the English template strings; existing translation catalogs
/// are indexed by them, so they must not change. The two-actor bucket always
/// phrases "and 1 other" and the many-actor bucket "and N others" with
/// `countOtherActors = actor count - 1`.
pub mod templates {
    pub mod single {
        pub const LIKE: &str = "{{ actorName }} liked your {{ activityVerb }}";
        pub const ACTIVITY_LIKE: &str = "{{ actorName }} liked your post";
        pub const POST_REACTION_LIKE: &str = "{{ actorName }} liked your comment";
        pub const REPOST: &str = "{{ actorName }} reposted your {{ activityVerb }}";
        pub const FOLLOW: &str = "{{ actorName }} started following you";
        pub const POST_ON_BUILD: &str = "{{ actorName }} made a post on your build.";
        pub const POST_ON_GARAGE: &str = "{{ actorName }} made a post on your garage.";
        pub const POST_MENTION: &str = "{{ actorName }} mentioned you in a post.";
        pub const COMMENT_OWN_REPLY: &str = "{{ actorName }} replied to your comment.";
        pub const COMMENT_ON_LABELED: &str =
            "{{ actorName }} replied to a comment on {{ ownerLabel }} post.";
        pub const COMMENT: &str = "{{ actorName }} replied to a comment.";
        pub const REACTION_OWN_POST: &str = "{{ actorName }} commented on your post.";
        pub const REACTION_MENTION: &str = "{{ actorName }} mentioned you in a comment.";
        pub const REACTION_ON_LABELED: &str =
            "{{ actorName }} also commented on {{ ownerLabel }} post.";
        pub const REACTION: &str = "{{ actorName }} commented on a post.";
    }

    pub mod two {
        pub const LIKE: &str = "{{ actorName }} and 1 other liked your {{ activityVerb }}";
        pub const ACTIVITY_LIKE: &str = "{{ actorName }} and 1 other liked your post";
        pub const POST_REACTION_LIKE: &str = "{{ actorName }} and 1 other liked your comment";
        pub const REPOST: &str = "{{ actorName }} and 1 other reposted your {{ activityVerb }}";
        pub const FOLLOW: &str = "{{ actorName }} and 1 other started following you";
        pub const POST_ON_BUILD: &str = "{{ actorName }} and 1 other made a post on your build.";
        pub const POST_ON_GARAGE: &str = "{{ actorName }} and 1 other made a post on your garage.";
        pub const POST_MENTION: &str = "{{ actorName }} and 1 other mentioned you in a post.";
        pub const COMMENT_OWN_REPLY: &str = "{{ actorName }} and 1 other replied to your comment.";
        pub const COMMENT_ON_LABELED: &str =
            "{{ actorName }} and 1 other replied to a comment on {{ ownerLabel }} post.";
        pub const COMMENT: &str = "{{ actorName }} and 1 other replied to a comment.";
        pub const REACTION_OWN_POST: &str = "{{ actorName }} and 1 other commented on your post.";
        // the single bucket says "in a comment." here; wider buckets have
        // always said "in a post."
        pub const REACTION_MENTION: &str = "{{ actorName }} and 1 other mentioned you in a post.";
        pub const REACTION_ON_LABELED: &str =
            "{{ actorName }} and 1 other also commented on {{ ownerLabel }} post.";
        pub const REACTION: &str = "{{ actorName }} and 1 other commented on a post.";
    }

    pub mod many {
        pub const LIKE: &str =
            "{{ actorName }} and {{ countOtherActors }} others liked your {{ activityVerb }}";
        pub const ACTIVITY_LIKE: &str =
            "{{ actorName }} and {{ countOtherActors }} others liked your post";
        pub const POST_REACTION_LIKE: &str =
            "{{ actorName }} and {{ countOtherActors }} others liked your comment";
        pub const REPOST: &str =
            "{{ actorName }} and {{ countOtherActors }} others reposted your {{ activityVerb }}";
        pub const FOLLOW: &str =
            "{{ actorName }} and {{ countOtherActors }} others started following you";
        pub const POST_ON_BUILD: &str =
            "{{ actorName }} and {{ countOtherActors }} others made a post on your build.";
        pub const POST_ON_GARAGE: &str =
            "{{ actorName }} and {{ countOtherActors }} others made a post on your garage.";
        pub const POST_MENTION: &str =
            "{{ actorName }} and {{ countOtherActors }} others mentioned you in a post.";
        pub const COMMENT_OWN_REPLY: &str =
            "{{ actorName }} and {{ countOtherActors }} others replied to your comment.";
        pub const COMMENT_ON_LABELED: &str = "{{ actorName }} and {{ countOtherActors }} others replied to a comment on {{ ownerLabel }} post.";
        pub const COMMENT: &str =
            "{{ actorName }} and {{ countOtherActors }} others replied to a comment.";
        pub const REACTION_OWN_POST: &str =
            "{{ actorName }} and {{ countOtherActors }} others commented on your post.";
        pub const REACTION_MENTION: &str =
            "{{ actorName }} and {{ countOtherActors }} others mentioned you in a post.";
        pub const REACTION_ON_LABELED: &str = "{{ actorName }} and {{ countOtherActors }} others also commented on {{ ownerLabel }} post.";
        pub const REACTION: &str =
            "{{ actorName }} and {{ countOtherActors }} others commented on a post.";
    }
}

#[derive(Clone, Debug, ThisError)]
pub enum ResolveError {
    #[error("Activity group has no activities")]
    EmptyGroup,
}

/// Non-fatal condition met while resolving, returned with the result instead
/// of going through a hidden global channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownVerb { verb: String },
}

/// Variable bag handed to the translator, serialized with the camelCase
/// names the templates reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineVars {
    pub actor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_verb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_other_actors: Option<usize>,
}

/// Outcome of resolving one notification group.
#[derive(Clone, Debug)]
pub struct Resolved<'a> {
    /// Display headline. Empty for unrecognized verbs: the caller renders no
    /// text, the rest of the notification still renders.
    pub headline: String,
    /// The selected template key, `None` when the verb was unrecognized.
    pub key: Option<&'static str>,
    pub vars: HeadlineVars,
    /// Object to render as a nested preview beneath the headline. Follows
    /// have nothing to preview.
    pub attached: Option<&'a ActivityObject>,
    /// Id that downstream identity-sensitive callbacks must use. When the
    /// latest object is a raw reference and `meta.original_id` is set, that
    /// id wins over the activity's own.
    pub effective_id: Option<ActivityId>,
    /// Actors behind the latest one, defaulted, for avatar-group display.
    pub other_actors: Vec<Cow<'a, User>>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug)]
enum Bucket {
    Single,
    Two,
    Many { other_count: usize },
}

impl Bucket {
    fn for_count(count: usize) -> Bucket {
        match count {
            1 => Bucket::Single,
            2 => Bucket::Two,
            count => Bucket::Many {
                other_count: count - 1,
            },
        }
    }

    fn key(
        &self,
        single: &'static str,
        two: &'static str,
        many: &'static str,
    ) -> &'static str {
        match self {
            Bucket::Single => single,
            Bucket::Two => two,
            Bucket::Many { .. } => many,
        }
    }
}

/// Resolves an activity group into a notification headline.
///
/// Pure: identical inputs give identical outputs, nothing is mutated, the
/// group is only borrowed. The caller's newest-first ordering is trusted.
/// The only fatal input is an empty activity list; every missing or
/// malformed optional field degrades to the generic template branch.
pub fn resolve<'a>(
    group: &'a ActivityGroup,
    viewer: &UserId,
    translator: &dyn Translate,
) -> Result<Resolved<'a>, ResolveError> {
    let latest = group.latest().ok_or(ResolveError::EmptyGroup)?;
    let actor = user_or_default(latest.actor.as_ref());
    let bucket = Bucket::for_count(group.activities.len());

    let mut vars = HeadlineVars {
        actor_name: actor.display_name().to_string(),
        ..HeadlineVars::default()
    };
    if let Bucket::Many { other_count } = bucket {
        vars.count_other_actors = Some(other_count);
    }

    let key = select_template(latest, bucket, viewer, &mut vars);

    let mut diagnostics = Vec::new();
    let headline = match key {
        Some(key) => {
            let context = serde_json::to_value(&vars).unwrap_or(Value::Null);
            translator.translate(key, &context)
        }
        None => {
            warn!(
                "No notification headline for verb {}, rendering none",
                latest.verb.as_str()
            );
            diagnostics.push(Diagnostic::UnknownVerb {
                verb: latest.verb.as_str().to_string(),
            });
            String::new()
        }
    };

    let attached = match latest.verb {
        Verb::Follow => None,
        _ => latest.object.as_ref(),
    };

    let effective_id = effective_id(latest);

    let other_actors = group.activities[1..]
        .iter()
        .map(|activity| user_or_default(activity.actor.as_ref()))
        .collect();

    Ok(Resolved {
        headline,
        key,
        vars,
        attached,
        effective_id,
        other_actors,
        diagnostics,
    })
}

/// Id substitution for identity-sensitive callbacks: a raw string object
/// paired with `meta.original_id` means the group was keyed by a copy and
/// the original id must be used downstream.
fn effective_id(latest: &Activity) -> Option<ActivityId> {
    let is_ref_object = matches!(latest.object, Some(ActivityObject::Ref(_)));
    let original_id = latest
        .meta
        .as_ref()
        .and_then(|meta| meta.original_id.clone());
    match (is_ref_object, original_id) {
        (true, Some(original_id)) => Some(original_id),
        _ => latest.id.clone(),
    }
}

fn select_template(
    latest: &Activity,
    bucket: Bucket,
    viewer: &UserId,
    vars: &mut HeadlineVars,
) -> Option<&'static str> {
    use templates::{many, single, two};

    let meta = latest.meta();

    let key = match &latest.verb {
        Verb::Like => {
            vars.activity_verb = object_verb(latest);
            bucket.key(single::LIKE, two::LIKE, many::LIKE)
        }
        Verb::ActivityLike => bucket.key(single::ACTIVITY_LIKE, two::ACTIVITY_LIKE, many::ACTIVITY_LIKE),
        Verb::PostReactionLike => bucket.key(
            single::POST_REACTION_LIKE,
            two::POST_REACTION_LIKE,
            many::POST_REACTION_LIKE,
        ),
        Verb::Repost => {
            vars.activity_verb = object_verb(latest);
            bucket.key(single::REPOST, two::REPOST, many::REPOST)
        }
        Verb::Follow => bucket.key(single::FOLLOW, two::FOLLOW, many::FOLLOW),
        Verb::Post => {
            // first matching owner field wins
            if meta.build_owned_by(viewer) {
                bucket.key(single::POST_ON_BUILD, two::POST_ON_BUILD, many::POST_ON_BUILD)
            } else if meta.garage_owned_by(viewer) {
                bucket.key(
                    single::POST_ON_GARAGE,
                    two::POST_ON_GARAGE,
                    many::POST_ON_GARAGE,
                )
            } else {
                bucket.key(single::POST_MENTION, two::POST_MENTION, many::POST_MENTION)
            }
        }
        Verb::Comment => {
            if meta.reaction_owned_by(viewer) {
                bucket.key(
                    single::COMMENT_OWN_REPLY,
                    two::COMMENT_OWN_REPLY,
                    many::COMMENT_OWN_REPLY,
                )
            } else if let Some(label) = &meta.activity_owner_label {
                vars.owner_label = Some(label.clone());
                bucket.key(
                    single::COMMENT_ON_LABELED,
                    two::COMMENT_ON_LABELED,
                    many::COMMENT_ON_LABELED,
                )
            } else {
                bucket.key(single::COMMENT, two::COMMENT, many::COMMENT)
            }
        }
        Verb::Reaction => {
            if meta.activity_owned_by(viewer) {
                bucket.key(
                    single::REACTION_OWN_POST,
                    two::REACTION_OWN_POST,
                    many::REACTION_OWN_POST,
                )
            } else if meta.mentions(viewer) {
                bucket.key(
                    single::REACTION_MENTION,
                    two::REACTION_MENTION,
                    many::REACTION_MENTION,
                )
            } else if let Some(label) = &meta.activity_owner_label {
                vars.owner_label = Some(label.clone());
                bucket.key(
                    single::REACTION_ON_LABELED,
                    two::REACTION_ON_LABELED,
                    many::REACTION_ON_LABELED,
                )
            } else {
                bucket.key(single::REACTION, two::REACTION, many::REACTION)
            }
        }
        Verb::Other(_) => return None,
    };

    Some(key)
}

fn object_verb(latest: &Activity) -> Option<String> {
    latest
        .object
        .as_ref()
        .and_then(|object| object.verb())
        .map(|verb| verb.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_i18n::TemplateTranslator;
    use feed_model::ActivityGroup;
    use serde_json::json;

    fn group(value: serde_json::Value) -> ActivityGroup {
        ActivityGroup::from_json(value).unwrap()
    }

    fn resolve_group(value: serde_json::Value, viewer: UserId) -> Resolved<'static> {
        // leak so the borrow in Resolved can escape the helper in tests
        let group: &'static ActivityGroup = Box::leak(Box::new(group(value)));
        resolve(group, &viewer, &TemplateTranslator::new()).unwrap()
    }

    #[test]
    fn test_single_like_scenario() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "verb": "like",
                    "actor": { "data": { "name": "Ann" } },
                    "object": { "verb": "post" }
                }]
            }),
            UserId::from(1u64),
        );
        assert_eq!(resolved.key, Some(templates::single::LIKE));
        assert_eq!(resolved.vars.actor_name, "Ann");
        assert_eq!(resolved.vars.activity_verb.as_deref(), Some("post"));
        assert_eq!(resolved.headline, "Ann liked your post");
    }

    #[test]
    fn test_two_actor_bucket_says_one_other() {
        let resolved = resolve_group(
            json!({
                "activities": [
                    { "verb": "follow", "actor": { "data": { "name": "Ann" } } },
                    { "verb": "follow", "actor": { "data": { "name": "Bo" } } }
                ]
            }),
            UserId::from(1u64),
        );
        assert_eq!(resolved.key, Some(templates::two::FOLLOW));
        assert_eq!(resolved.vars.count_other_actors, None);
        assert_eq!(resolved.headline, "Ann and 1 other started following you");
    }

    #[test]
    fn test_multi_follow_scenario() {
        let resolved = resolve_group(
            json!({
                "activities": [
                    { "verb": "follow", "actor": { "data": { "name": "Ann" } } },
                    { "verb": "follow", "actor": { "data": { "name": "Bo" } } },
                    { "verb": "follow", "actor": { "data": { "name": "Cy" } } }
                ]
            }),
            UserId::from(1u64),
        );
        assert_eq!(resolved.key, Some(templates::many::FOLLOW));
        assert_eq!(resolved.vars.count_other_actors, Some(2));
        assert!(resolved.attached.is_none());
        assert_eq!(resolved.other_actors.len(), 2);
        assert_eq!(
            resolved.headline,
            "Ann and 2 others started following you"
        );
    }

    #[test]
    fn test_comment_owner_coercion_scenario() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "verb": "comment",
                    "meta": { "reaction_owner": "7" }
                }]
            }),
            UserId::from(7u64),
        );
        assert_eq!(resolved.key, Some(templates::single::COMMENT_OWN_REPLY));
    }

    #[test]
    fn test_comment_ownership_priority() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "verb": "comment",
                    "meta": {
                        "reaction_owner": 7,
                        "activity_owner_label": "Dale"
                    }
                }]
            }),
            UserId::from(7u64),
        );
        // reaction_owner wins over activity_owner_label
        assert_eq!(resolved.key, Some(templates::single::COMMENT_OWN_REPLY));
        assert_eq!(resolved.vars.owner_label, None);
    }

    #[test]
    fn test_comment_labeled_branch() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "verb": "comment",
                    "actor": { "data": { "name": "Ann" } },
                    "meta": { "activity_owner_label": "Dale" }
                }]
            }),
            UserId::from(1u64),
        );
        assert_eq!(resolved.key, Some(templates::single::COMMENT_ON_LABELED));
        assert_eq!(
            resolved.headline,
            "Ann replied to a comment on Dale post."
        );
    }

    #[test]
    fn test_reaction_ownership_priority_order() {
        let meta = json!({
            "activity_owner": 7,
            "users": [7],
            "activity_owner_label": "Dale"
        });
        let resolved = resolve_group(
            json!({ "activities": [{ "verb": "reaction", "meta": meta }] }),
            UserId::from(7u64),
        );
        assert_eq!(resolved.key, Some(templates::single::REACTION_OWN_POST));

        let meta = json!({ "users": [7], "activity_owner_label": "Dale" });
        let resolved = resolve_group(
            json!({ "activities": [{ "verb": "reaction", "meta": meta }] }),
            UserId::from(7u64),
        );
        assert_eq!(resolved.key, Some(templates::single::REACTION_MENTION));
    }

    #[test]
    fn test_reaction_mention_wording_widens_to_post() {
        let resolved = resolve_group(
            json!({
                "activities": [
                    {
                        "verb": "reaction",
                        "actor": { "data": { "name": "Ann" } },
                        "meta": { "users": [7] }
                    },
                    { "verb": "reaction" }
                ]
            }),
            UserId::from(7u64),
        );
        assert_eq!(resolved.key, Some(templates::two::REACTION_MENTION));
        assert_eq!(
            resolved.headline,
            "Ann and 1 other mentioned you in a post."
        );
    }

    #[test]
    fn test_post_build_owner_beats_garage_owner() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "verb": "post",
                    "meta": { "build_owners": ["7"], "garage_owner": 7 }
                }]
            }),
            UserId::from(7u64),
        );
        assert_eq!(resolved.key, Some(templates::single::POST_ON_BUILD));
    }

    #[test]
    fn test_unknown_verb_degrades_to_empty_headline() {
        let resolved = resolve_group(
            json!({ "activities": [{ "verb": "frobnicate" }] }),
            UserId::from(1u64),
        );
        assert_eq!(resolved.headline, "");
        assert_eq!(resolved.key, None);
        assert_eq!(
            resolved.diagnostics,
            vec![Diagnostic::UnknownVerb {
                verb: "frobnicate".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_group_is_invalid_input() {
        let group = group(json!({ "activities": [] }));
        let viewer = UserId::from(1u64);
        let result = resolve(&group, &viewer, &TemplateTranslator::new());
        assert!(matches!(result, Err(ResolveError::EmptyGroup)));
    }

    #[test]
    fn test_original_id_substitution() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "id": "abc123",
                    "verb": "comment",
                    "object": "abc123",
                    "meta": { "original_id": "xyz789" }
                }]
            }),
            UserId::from(1u64),
        );
        assert_eq!(
            resolved.effective_id,
            Some(feed_ref::ActivityId::from("xyz789"))
        );
    }

    #[test]
    fn test_effective_id_without_original_id() {
        let resolved = resolve_group(
            json!({
                "activities": [{
                    "id": "abc123",
                    "verb": "like",
                    "object": { "verb": "post" },
                    "meta": { "original_id": "xyz789" }
                }]
            }),
            UserId::from(1u64),
        );
        // nested object: the group was not keyed by a copy
        assert_eq!(
            resolved.effective_id,
            Some(feed_ref::ActivityId::from("abc123"))
        );
    }

    #[test]
    fn test_never_errors_on_missing_optional_fields() {
        let verbs = [
            "like",
            "activityLike",
            "postReactionLike",
            "repost",
            "follow",
            "post",
            "comment",
            "reaction",
            "frobnicate",
        ];
        let viewer = UserId::from(1u64);
        for verb in verbs {
            for count in [1, 2, 5] {
                let activities: Vec<_> = (0..count).map(|_| json!({ "verb": verb })).collect();
                let group = group(json!({ "activities": activities }));
                let resolved = resolve(&group, &viewer, &TemplateTranslator::new()).unwrap();
                if verb == "frobnicate" {
                    assert_eq!(resolved.headline, "");
                } else {
                    assert!(!resolved.headline.is_empty(), "verb {} count {}", verb, count);
                }
            }
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let group = group(json!({
            "activities": [
                {
                    "verb": "reaction",
                    "actor": { "data": { "name": "Ann" } },
                    "meta": { "activity_owner": "9", "users": [3] }
                },
                { "verb": "reaction" },
                { "verb": "reaction" }
            ]
        }));
        let viewer = UserId::from(9u64);
        let translator = TemplateTranslator::new();
        let first = resolve(&group, &viewer, &translator).unwrap();
        let second = resolve(&group, &viewer, &translator).unwrap();
        assert_eq!(first.headline, second.headline);
        assert_eq!(first.key, second.key);
        assert_eq!(first.vars, second.vars);
    }
}
