//! Issue lifecycle and query operations
//!
//! Everything the API and the CLI do to issues goes through [`IssueService`].

use serde::Deserialize;

use crate::access::AdminCapability;
use crate::id::{generate_id, parse_id};
use crate::{Error, Issue, NewIssue, Result, Status, StatusUpdate, Store};

/// Equality filters for listing issues. Blank values mean "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl IssueFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct IssueService {
    store: Store,
    prefix: String,
}

impl IssueService {
    pub fn new(store: Store, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validate and persist a new issue
    pub fn create(&self, input: NewIssue) -> Result<Issue> {
        let issue = input.into_issue(generate_id(&self.prefix))?;
        self.store.insert(issue.clone())?;
        Ok(issue)
    }

    /// Issues matching `filter`, newest first. Equal timestamps keep
    /// insertion order.
    pub fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let status = present(&filter.status)
            .map(str::parse::<Status>)
            .transpose()?;
        let category = present(&filter.category);
        let created_by = present(&filter.created_by);

        let mut issues = self.store.list()?;
        issues.retain(|issue| {
            category.is_none_or(|c| issue.category == c)
                && status.is_none_or(|s| issue.status == s)
                && created_by.is_none_or(|u| issue.created_by == u)
        });
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(issues)
    }

    pub fn get(&self, id: &str) -> Result<Issue> {
        if parse_id(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.store
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Add `user_id` to the issue's upvotes, or withdraw it if already there
    pub fn toggle_upvote(&self, id: &str, user_id: &str) -> Result<Issue> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            // Unknown issue wins over a missing user
            self.get(id)?;
            return Err(Error::Validation("Missing userId".into()));
        }
        self.store.toggle_upvote(id, user_id)
    }

    /// Change status and annotations. Fails with `Conflict` if the issue was
    /// modified between the read and the write.
    pub fn update_status(
        &self,
        _admin: &AdminCapability,
        id: &str,
        update: &StatusUpdate,
    ) -> Result<Issue> {
        let mut issue = self.get(id)?;
        if update.is_empty() {
            return Ok(issue);
        }
        let expected_version = issue.version;
        issue.apply_status_update(update)?;
        self.store.replace_if_version(issue, expected_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Caller, Location, Role};

    fn service() -> IssueService {
        IssueService::new(Store::in_memory(), "iss")
    }

    fn new_issue(title: &str, category: &str, created_by: &str) -> NewIssue {
        NewIssue {
            title: title.into(),
            description: format!("{title} description"),
            category: category.into(),
            location: Location::new(18.5, 73.8, "Main St").unwrap().into(),
            created_by: created_by.into(),
            image: None,
        }
    }

    fn admin() -> AdminCapability {
        Caller::new("admin", Role::Admin).admin_capability().unwrap()
    }

    #[test]
    fn test_pothole_scenario() {
        let svc = service();
        let issue = svc
            .create(new_issue("Pothole", "Infrastructure", "u1"))
            .unwrap();
        assert_eq!(issue.status, Status::Pending);
        assert!(issue.upvotes.is_empty());
        assert!(issue.id.starts_with("iss-"));

        let issue = svc.toggle_upvote(&issue.id, "u2").unwrap();
        assert_eq!(issue.upvotes.iter().collect::<Vec<_>>(), ["u2"]);

        let issue = svc.toggle_upvote(&issue.id, "u2").unwrap();
        assert!(issue.upvotes.is_empty());
        assert_eq!(svc.get(&issue.id).unwrap().upvote_count(), 0);
    }

    #[test]
    fn test_upvotes_stay_unique() {
        let svc = service();
        let id = svc
            .create(new_issue("Leak", "Utilities", "u1"))
            .unwrap()
            .id;
        for user in ["u2", "u3", "u2", "u2", "u3", "u4"] {
            svc.toggle_upvote(&id, user).unwrap();
        }
        let issue = svc.get(&id).unwrap();
        assert_eq!(issue.upvotes.iter().collect::<Vec<_>>(), ["u2", "u4"]);
    }

    #[test]
    fn test_toggle_errors() {
        let svc = service();
        let id = svc
            .create(new_issue("Leak", "Utilities", "u1"))
            .unwrap()
            .id;

        assert!(matches!(
            svc.toggle_upvote("iss-nothere", "u2"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.toggle_upvote("iss-nothere", ""),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.toggle_upvote(&id, "  "),
            Err(Error::Validation(_))
        ));
        assert_eq!(svc.get(&id).unwrap().version, 0);
    }

    #[test]
    fn test_list_filters_and_orders_newest_first() {
        let svc = service();
        let a = svc.create(new_issue("A", "Infrastructure", "u1")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        svc.create(new_issue("B", "Environment", "u1")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let c = svc.create(new_issue("C", "Infrastructure", "u2")).unwrap();

        let infra = svc.list(&IssueFilter::category("Infrastructure")).unwrap();
        let ids: Vec<_> = infra.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, [c.id.as_str(), a.id.as_str()]);

        assert_eq!(svc.list(&IssueFilter::default()).unwrap().len(), 3);
        assert_eq!(svc.list(&IssueFilter::category("")).unwrap().len(), 3);
        assert!(svc.list(&IssueFilter::category("Education")).unwrap().is_empty());

        let by_u2 = svc
            .list(&IssueFilter {
                created_by: Some("u2".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_u2.len(), 1);
    }

    #[test]
    fn test_list_ties_keep_insertion_order() {
        let svc = service();
        let base = new_issue("Same", "Other", "u1")
            .into_issue("iss-first".into())
            .unwrap();
        let mut second = base.clone();
        second.id = "iss-second".into();
        svc.store().insert(base).unwrap();
        svc.store().insert(second).unwrap();

        let ids: Vec<_> = svc
            .list(&IssueFilter::default())
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, ["iss-first", "iss-second"]);
    }

    #[test]
    fn test_list_rejects_bad_status_filter() {
        let svc = service();
        let filter = IssueFilter {
            status: Some("closed".into()),
            ..Default::default()
        };
        assert!(matches!(svc.list(&filter), Err(Error::InvalidStatus(_))));
    }

    #[test]
    fn test_resolve_pending_issue() {
        let svc = service();
        let created = svc
            .create(new_issue("Pothole", "Infrastructure", "u1"))
            .unwrap();
        let update = StatusUpdate {
            status: Some("resolved".into()),
            remarks: Some("Patched".into()),
            estimated_fix_time: None,
        };
        let updated = svc.update_status(&admin(), &created.id, &update).unwrap();
        assert_eq!(updated.status, Status::Resolved);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.created_by, created.created_by);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let list = svc
            .list(&IssueFilter {
                status: Some("resolved".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_settled_issue_can_reopen() {
        let svc = service();
        let id = svc
            .create(new_issue("Pothole", "Infrastructure", "u1"))
            .unwrap()
            .id;
        for status in ["rejected", "pending", "in progress", "resolved", "in progress"] {
            let update = StatusUpdate {
                status: Some(status.into()),
                ..Default::default()
            };
            let issue = svc.update_status(&admin(), &id, &update).unwrap();
            assert_eq!(issue.status, status.parse::<Status>().unwrap());
        }
    }

    #[test]
    fn test_invalid_status_leaves_record_unchanged() {
        let svc = service();
        let created = svc
            .create(new_issue("Pothole", "Infrastructure", "u1"))
            .unwrap();
        let update = StatusUpdate {
            status: Some("closed".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_status(&admin(), &created.id, &update),
            Err(Error::InvalidStatus(_))
        ));
        let stored = svc.get(&created.id).unwrap();
        assert_eq!(stored.status, Status::Pending);
        assert_eq!(stored.version, created.version);
    }

    #[test]
    fn test_update_status_missing_issue() {
        let svc = service();
        let update = StatusUpdate {
            status: Some("resolved".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_status(&admin(), "iss-nothere", &update),
            Err(Error::NotFound(_))
        ));
        assert!(svc.store().is_empty().unwrap());
    }

    #[test]
    fn test_empty_status_update_returns_issue_unchanged() {
        let svc = service();
        let created = svc
            .create(new_issue("Pothole", "Infrastructure", "u1"))
            .unwrap();
        let issue = svc
            .update_status(&admin(), &created.id, &StatusUpdate::default())
            .unwrap();
        assert_eq!(issue.version, created.version);
        assert_eq!(issue.updated_at, created.updated_at);
        assert_eq!(issue.status, Status::Pending);

        assert!(matches!(
            svc.update_status(&admin(), "iss-nothere", &StatusUpdate::default()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_get_malformed_id_is_not_found() {
        assert!(matches!(service().get("garbage"), Err(Error::NotFound(_))));
    }
}
