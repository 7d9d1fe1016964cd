use axohtml::{
    dom::DOMTree,
    elements::{li, FlowContent},
    html, text, unsafe_text,
};
use chrono::{DateTime, Utc};
use feed_i18n::Translate;
use feed_model::{user_or_default, Activity, ActivityGroup, ActivityObject, Comment};
use feed_notify::resolve;
use feed_ref::{HandleRef, UserId};
use feed_text::{humanize_timestamp, render_html, sanitize_url};
use serde_json::to_string_pretty;
use std::{io, path::PathBuf};
use tokio::fs::write;

const AVATAR_PLACEHOLDER: &str = "/images/placeholder.png";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to write to file: {0}")]
    WriteFile(#[source] io::Error),
    #[error("Failed to serialize JSON to string: {0}")]
    JsonToString(#[source] serde_json::Error),
    #[error("Failed to resolve notification: {0}")]
    Resolve(#[from] feed_notify::ResolveError),
}

pub struct Config {
    pub base_dir: PathBuf,
}

pub async fn write_notification_html(
    config: &Config,
    slug: &str,
    group: &ActivityGroup,
    viewer: &UserId,
    translator: &dyn Translate,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let Config { base_dir } = config;
    let page_path = base_dir
        .join("notification")
        .join(slug)
        .with_extension("html");
    let page_html = render_notification(group, viewer, translator, now)?;
    let page_bytes = page_html.to_string();

    write(page_path, page_bytes)
        .await
        .map_err(Error::WriteFile)?;

    Ok(())
}

pub async fn write_group_json(
    config: &Config,
    slug: &str,
    group: &ActivityGroup,
) -> Result<(), Error> {
    let Config { base_dir } = config;
    let json_path = base_dir
        .join("notification")
        .join(slug)
        .with_extension("json");
    let group_json = to_string_pretty(&group).map_err(Error::JsonToString)?;

    write(json_path, group_json)
        .await
        .map_err(Error::WriteFile)?;

    Ok(())
}

/// One notification row: avatar of the latest actor, resolved headline,
/// humanized time, attached-activity preview (follows have none), and the
/// avatar group of the remaining actors for follow batches.
pub fn render_notification(
    group: &ActivityGroup,
    viewer: &UserId,
    translator: &dyn Translate,
    now: DateTime<Utc>,
) -> Result<DOMTree<String>, feed_notify::ResolveError> {
    let resolved = resolve(group, viewer, translator)?;
    // resolve guarantees a latest activity
    let latest = &group.activities[0];
    let actor = user_or_default(latest.actor.as_ref());

    let headline: Option<Box<dyn FlowContent<String>>> = if resolved.headline.is_empty() {
        None
    } else {
        Some(html!(<strong>{ text!("{}", resolved.headline) }</strong>))
    };

    let time: Option<Box<dyn FlowContent<String>>> = latest.time.as_ref().map(|time| {
        let humanized = humanize_timestamp(time, now);
        let node: Box<dyn FlowContent<String>> = html!(
            <div><small>{ text!("{}", humanized) }</small></div>
        );
        node
    });

    let attached = resolved.attached.and_then(render_attached);

    let avatar_group: Vec<Box<dyn FlowContent<String>>> =
        if matches!(latest.verb, feed_model::Verb::Follow) && group.actor_count() > 1 {
            resolved
                .other_actors
                .iter()
                .map(|user| avatar(user.data.profile_image.as_deref()))
                .collect()
        } else {
            Vec::new()
        };

    let children: Vec<Box<dyn FlowContent<String>>> = vec![
        avatar(actor.data.profile_image.as_deref()),
        html!(
            <div class="raf-notification__content">
                <div class="raf-notification__header">{ headline }</div>
                { time }
                { attached }
            </div>
        ),
        html!(<div class="raf-notification__extra">{ avatar_group }</div>),
    ];

    let tree: DOMTree<String> = if group.is_read {
        html!(<div class=["raf-notification", "raf-notification--read"]>{ children }</div>)
    } else {
        html!(<div class="raf-notification">{ children }</div>)
    };
    Ok(tree)
}

/// Nested preview under a headline. Raw reference objects have nothing to
/// show; nested activities render author and text.
fn render_attached(object: &ActivityObject) -> Option<Box<dyn FlowContent<String>>> {
    let activity = object.nested()?;
    let author = user_or_default(activity.actor.as_ref());
    let text_html = activity
        .text
        .as_deref()
        .map(|text| render_html(text, "raf-attached-activity"))
        .unwrap_or_default();
    Some(html!(
        <div class="raf-attached-activity">
            <span class="raf-attached-activity__author">
                { text!("{}", author.display_name()) }
            </span>
            <p class="raf-attached-activity__text">{ unsafe_text!(text_html) }</p>
        </div>
    ))
}

/// A full activity card: user bar header, linkified text, gallery
/// thumbnails, file attachments.
pub fn render_activity(activity: &Activity, now: DateTime<Utc>) -> DOMTree<String> {
    let actor = user_or_default(activity.actor.as_ref());

    // activities with a raw string object and no text show the reference
    let text = match (&activity.text, &activity.object) {
        (Some(text), _) => text.trim().to_string(),
        (None, Some(ActivityObject::Ref(reference))) => reference.trim().to_string(),
        (None, _) => String::new(),
    };
    let content: Option<Box<dyn FlowContent<String>>> = if text.is_empty() {
        None
    } else {
        let text_html = render_html(&text, "raf-activity");
        Some(html!(<div class="raf-activity__text">{ unsafe_text!(text_html) }</div>))
    };

    let images: Vec<String> = match &activity.attachments {
        Some(attachments) => attachments.images.clone().unwrap_or_default(),
        None => activity.image.clone().into_iter().collect(),
    };
    let gallery = render_gallery(&images);

    let files: Vec<Box<li<String>>> = activity
        .attachments
        .as_ref()
        .and_then(|attachments| attachments.files.as_ref())
        .map(|files| {
            files
                .iter()
                .map(|file| {
                    let name = file.name.as_deref().unwrap_or("attachment");
                    let href = sanitize_url(file.url.as_deref().unwrap_or(""));
                    let node: Box<li<String>> = html!(
                        <li class="raf-activity__file">
                            <a href=href>{ text!("{}", name) }</a>
                        </li>
                    );
                    node
                })
                .collect()
        })
        .unwrap_or_default();
    let attachment_list: Option<Box<dyn FlowContent<String>>> = if files.is_empty() {
        None
    } else {
        Some(html!(<ol class="raf-activity__attachments">{ files }</ol>))
    };

    let og_card = activity
        .attachments
        .as_ref()
        .and_then(|attachments| attachments.og.as_ref())
        .map(|og| {
            let href = sanitize_url(og.url.as_deref().unwrap_or("")).to_string();
            let title = og.title.as_deref().unwrap_or("").to_string();
            let description = og.description.as_deref().unwrap_or("").to_string();
            let node: Box<dyn FlowContent<String>> = html!(
                <a class="raf-card" href=href>
                    <span class="raf-card__title">{ text!("{}", title) }</span>
                    <span class="raf-card__description">{ text!("{}", description) }</span>
                </a>
            );
            node
        });

    html!(
        <div class="raf-activity">
            { user_bar(&actor, activity.time.as_ref(), now) }
            <div class="raf-activity__content">
                { content }
                { og_card }
                { gallery }
                { attachment_list }
            </div>
        </div>
    )
}

pub fn render_comment(comment: &Comment, now: DateTime<Utc>) -> DOMTree<String> {
    let user = user_or_default(comment.user.as_ref());
    let text_html = comment
        .data
        .text
        .as_deref()
        .map(|text| render_html(text, "raf-comment-item"))
        .unwrap_or_default();
    let time: Option<Box<dyn FlowContent<String>>> = comment.created_at.as_ref().map(|time| {
        let humanized = humanize_timestamp(time, now);
        let node: Box<dyn FlowContent<String>> =
            html!(<small>{ text!("{}", humanized) }</small>);
        node
    });

    html!(
        <div class="raf-comment-item">
            { avatar(user.data.profile_image.as_deref()) }
            <div class="raf-comment-item__content">
                { author_link(&user) }
                <div class="raf-comment-item__text">{ unsafe_text!(text_html) }</div>
                { time }
            </div>
        </div>
    )
}

fn user_bar(
    user: &feed_model::User,
    time: Option<&feed_model::ActivityTime>,
    now: DateTime<Utc>,
) -> Box<dyn FlowContent<String>> {
    let extra: Option<Box<dyn FlowContent<String>>> = time.map(|time| {
        let humanized = humanize_timestamp(time, now);
        let node: Box<dyn FlowContent<String>> = html!(
            <p class="raf-user-bar__extra">{ text!("{}", humanized) }</p>
        );
        node
    });

    html!(
        <div class="raf-user-bar">
            { avatar(user.data.profile_image.as_deref()) }
            <div class="raf-user-bar__details">{ author_link(user) }</div>
            { extra }
        </div>
    )
}

fn author_link(user: &feed_model::User) -> Box<dyn FlowContent<String>> {
    let href = user
        .data
        .handle
        .as_deref()
        .and_then(|handle| HandleRef::from_string(format!("@{}", handle)).ok())
        .map(|handle| handle.to_page_url())
        .unwrap_or_else(|| "#".to_string());
    html!(
        <a class="raf-user-bar__username" href=href>
            { text!("{}", user.display_name()) }
        </a>
    )
}

fn render_gallery(images: &[String]) -> Option<Box<dyn FlowContent<String>>> {
    if images.is_empty() {
        return None;
    }
    let thumbs: Vec<Box<dyn FlowContent<String>>> = feed_media::gallery_urls(images)
        .into_iter()
        .map(|src| {
            let node: Box<dyn FlowContent<String>> =
                html!(<img class="raf-gallery__image" src=src alt=""/>);
            node
        })
        .collect();
    let overflow: Option<Box<dyn FlowContent<String>>> =
        feed_media::overflow_count(images.len()).map(|count| {
            let node: Box<dyn FlowContent<String>> =
                html!(<p class="raf-gallery__more">{ text!("{} more", count) }</p>);
            node
        });
    Some(html!(
        <div class="raf-gallery">
            { thumbs }
            { overflow }
        </div>
    ))
}

fn avatar(image: Option<&str>) -> Box<dyn FlowContent<String>> {
    let src = image.unwrap_or(AVATAR_PLACEHOLDER).to_string();
    html!(<img class=["raf-avatar", "raf-avatar--circle"] src=src alt=""/>)
}
