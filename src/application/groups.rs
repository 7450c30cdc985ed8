use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    application::repos::{CreateGroupParams, GroupsRepo, RepoError},
    domain::{
        entities::GroupRecord,
        forms::GROUP_TITLE_MAX_CHARS,
        slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug},
    },
};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("group title must not be empty")]
    EmptyTitle,
    #[error("group title exceeds 200 characters")]
    TitleTooLong,
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.repo.list_groups().await?)
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }
        if title.chars().count() > GROUP_TITLE_MAX_CHARS {
            return Err(GroupError::TitleTooLong);
        }

        let slug = match command.slug.as_deref() {
            Some(explicit) => {
                let slug = validate_slug(explicit)?;
                if self.repo.find_group_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            None => {
                let repo = self.repo.clone();
                generate_unique_slug_async(&title, move |candidate| {
                    let repo = repo.clone();
                    let candidate = candidate.to_string();
                    async move {
                        repo.find_group_by_slug(&candidate)
                            .await
                            .map(|found| found.is_none())
                    }
                })
                .await
                .map_err(|err| match err {
                    SlugAsyncError::Slug(err) => GroupError::Slug(err),
                    SlugAsyncError::Predicate(err) => GroupError::Repo(err),
                })?
            }
        };

        let attempted = slug.clone();
        let group = self
            .repo
            .create_group(CreateGroupParams {
                title,
                slug,
                description: command.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(attempted),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "application::groups::create",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MemoryGroups {
        groups: Mutex<Vec<GroupRecord>>,
    }

    #[async_trait]
    impl GroupsRepo for MemoryGroups {
        async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
            Ok(self.groups.lock().await.clone())
        }

        async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
            let groups = self.groups.lock().await;
            Ok(groups.iter().find(|group| group.slug == slug).cloned())
        }

        async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
            let mut groups = self.groups.lock().await;
            let group = GroupRecord {
                id: groups.len() as i64 + 1,
                title: params.title,
                slug: params.slug,
                description: params.description,
            };
            groups.push(group.clone());
            Ok(group)
        }
    }

    fn command(title: &str, slug: Option<&str>) -> CreateGroupCommand {
        CreateGroupCommand {
            title: title.to_string(),
            slug: slug.map(str::to_string),
            description: "  Test description ".to_string(),
        }
    }

    #[tokio::test]
    async fn derived_slugs_do_not_collide() {
        let service = GroupService::new(Arc::new(MemoryGroups::default()));

        let first = service.create(command("Cats", None)).await.expect("first");
        let second = service.create(command("Cats", None)).await.expect("second");

        assert_eq!(first.slug, "cats");
        assert_eq!(second.slug, "cats-2");
        assert_eq!(first.description, "Test description");
    }

    #[tokio::test]
    async fn explicit_slug_must_be_free() {
        let service = GroupService::new(Arc::new(MemoryGroups::default()));
        service
            .create(command("Test group", Some("test-slug")))
            .await
            .expect("created");

        let err = service
            .create(command("Other", Some("test-slug")))
            .await
            .expect_err("taken");
        assert!(matches!(err, GroupError::SlugTaken(slug) if slug == "test-slug"));
    }

    #[tokio::test]
    async fn title_is_required_and_bounded() {
        let service = GroupService::new(Arc::new(MemoryGroups::default()));

        assert!(matches!(
            service.create(command("  ", None)).await,
            Err(GroupError::EmptyTitle)
        ));
        assert!(matches!(
            service.create(command(&"x".repeat(201), None)).await,
            Err(GroupError::TitleTooLong)
        ));
    }
}
