use crate::server::{ServerError, media::ImageKind};
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use quill_common::{
    csrf::CSRF_FORM_FIELD,
    model::{
        Id,
        group::{Group, GroupMarker},
    },
    page::PageRequest,
    util::NonBlankText,
};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required.";

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(axum::Form), rejection(ServerError))]
pub struct Form<T>(pub T);

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct Query<T>(pub T);

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Repeated `page` parameters resolve to the last one instead of failing the whole request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(from = "Vec<(String, String)>")]
pub struct PageQuery {
    page: Option<String>,
}

impl From<Vec<(String, String)>> for PageQuery {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let page = pairs
            .into_iter()
            .rev()
            .find(|(name, _)| name == "page")
            .map(|(_, value)| value);

        Self { page }
    }
}

impl PageQuery {
    #[must_use]
    pub fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostSubmission {
    pub csrf_token: String,
    pub text: String,
    pub group: String,
    pub image: Option<Vec<u8>>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PostDraft {
    pub text: NonBlankText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<(ImageKind, Vec<u8>)>,
}

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;
        let mut submission = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some(CSRF_FORM_FIELD) => submission.csrf_token = field.text().await?,
                Some("text") => submission.text = field.text().await?,
                Some("group") => submission.group = field.text().await?,
                Some("image") => {
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        submission.image = Some(bytes.to_vec());
                    }
                }
                _ => {}
            }
        }

        Ok(submission)
    }
}

impl PostSubmission {
    pub fn validate(&self, groups: &[Group]) -> Result<PostDraft, FieldErrors> {
        let mut errors = FieldErrors::default();

        let text = NonBlankText::new(&self.text)
            .inspect_err(|_| errors.add("text", REQUIRED_FIELD_MESSAGE))
            .ok();

        let group = match self.group.trim() {
            "" => None,
            raw => {
                let group = raw
                    .parse::<Id<GroupMarker>>()
                    .ok()
                    .filter(|id| groups.iter().any(|group| group.id == *id));
                if group.is_none() {
                    errors.add(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                }
                group
            }
        };

        let image = match &self.image {
            None => None,
            Some(bytes) => {
                let kind = ImageKind::recognize(bytes);
                if kind.is_none() {
                    errors.add(
                        "image",
                        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                    );
                }
                kind.map(|kind| (kind, bytes.clone()))
            }
        };

        match (text, errors.is_empty()) {
            (Some(text), true) => Ok(PostDraft { text, group, image }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{
        form::{PageQuery, PostSubmission, REQUIRED_FIELD_MESSAGE},
        media::{ImageKind, samples::RED_PNG},
    };
    use quill_common::{
        model::{
            Id,
            group::{Group, Slug},
        },
        page::PageRequest,
    };

    fn groups() -> Vec<Group> {
        vec![Group {
            id: Id::new(4),
            title: "Cats".to_owned(),
            slug: Slug::new("cats".to_owned()).unwrap(),
            description: String::new(),
        }]
    }

    #[test]
    fn valid_submission() {
        let submission = PostSubmission {
            text: "  hello  ".to_owned(),
            group: "4".to_owned(),
            image: Some(RED_PNG.to_vec()),
            ..PostSubmission::default()
        };

        let draft = submission.validate(&groups()).unwrap();
        assert_eq!(&*draft.text, "hello");
        assert_eq!(draft.group, Some(Id::new(4)));
        assert_eq!(draft.image.map(|(kind, _)| kind), Some(ImageKind::Png));
    }

    #[test]
    fn blank_text_and_unknown_group() {
        let submission = PostSubmission {
            text: " \n ".to_owned(),
            group: "5".to_owned(),
            ..PostSubmission::default()
        };

        let errors = submission.validate(&groups()).unwrap_err();
        assert_eq!(errors.get("text"), Some(REQUIRED_FIELD_MESSAGE));
        assert!(errors.get("group").is_some());
        assert_eq!(errors.get("image"), None);
    }

    #[test]
    fn non_image_upload() {
        let submission = PostSubmission {
            text: "text".to_owned(),
            image: Some(b"#!/bin/sh".to_vec()),
            ..PostSubmission::default()
        };

        let errors = submission.validate(&groups()).unwrap_err();
        assert!(errors.get("image").is_some());
    }

    #[test]
    fn corrupt_image_upload() {
        let submission = PostSubmission {
            text: "text".to_owned(),
            image: Some(b"GIF89a this is not an image".to_vec()),
            ..PostSubmission::default()
        };

        let errors = submission.validate(&groups()).unwrap_err();
        assert!(errors.get("image").is_some());
    }

    #[test]
    fn last_page_parameter_wins() {
        let query = PageQuery::from(vec![
            ("page".to_owned(), "1".to_owned()),
            ("other".to_owned(), "x".to_owned()),
            ("page".to_owned(), "2".to_owned()),
        ]);
        assert_eq!(query.request(), PageRequest::parse(Some("2")));
        assert_eq!(PageQuery::from(Vec::new()).request(), PageRequest::FIRST);
    }
}
