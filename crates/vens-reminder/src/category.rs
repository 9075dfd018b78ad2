//! Notification categories and the actions each supports.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::info;

use vens_core::types::CategoryId;

use crate::error::ReminderError;
use crate::notifier::Notifier;

/// User actions offered on reminder notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionId {
    MarkAsTracked,
    RemindLater,
    MedicationTaken,
    MedicationSkip,
    MedicationRemind,
    ViewFertilityDetails,
}

impl ActionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::MarkAsTracked => "MARK_AS_TRACKED",
            ActionId::RemindLater => "REMIND_LATER",
            ActionId::MedicationTaken => "MEDICATION_TAKEN",
            ActionId::MedicationSkip => "MEDICATION_SKIP",
            ActionId::MedicationRemind => "MEDICATION_REMIND",
            ActionId::ViewFertilityDetails => "VIEW_FERTILITY_DETAILS",
        }
    }

    /// How far a snoozing action pushes the reminder out.
    pub fn snooze_secs(&self) -> Option<i64> {
        match self {
            ActionId::RemindLater => Some(60 * 60),
            ActionId::MedicationRemind => Some(30 * 60),
            _ => None,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MARK_AS_TRACKED" => Ok(ActionId::MarkAsTracked),
            "REMIND_LATER" => Ok(ActionId::RemindLater),
            "MEDICATION_TAKEN" => Ok(ActionId::MedicationTaken),
            "MEDICATION_SKIP" => Ok(ActionId::MedicationSkip),
            "MEDICATION_REMIND" => Ok(ActionId::MedicationRemind),
            "VIEW_FERTILITY_DETAILS" => Ok(ActionId::ViewFertilityDetails),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// One button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub label: &'static str,
    /// Rendered as a destructive button.
    pub destructive: bool,
    /// Brings the app to the foreground when tapped.
    pub foreground: bool,
}

impl ActionDefinition {
    const fn new(id: ActionId, label: &'static str, destructive: bool, foreground: bool) -> Self {
        Self {
            id,
            label,
            destructive,
            foreground,
        }
    }
}

/// A notification category: an ordered set of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDefinition {
    pub id: CategoryId,
    pub actions: Vec<ActionDefinition>,
    /// Report explicit dismissals back to the app.
    pub custom_dismiss: bool,
}

impl CategoryDefinition {
    pub fn action(&self, action: ActionId) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == action)
    }
}

/// Catalog of categories, installed with the notifier as a whole.
#[derive(Debug)]
pub struct CategoryRegistry {
    catalog: Vec<CategoryDefinition>,
    installs: AtomicUsize,
}

impl CategoryRegistry {
    /// The fixed catalog of reminder categories.
    pub fn standard() -> Self {
        use ActionId::*;

        let catalog = vec![
            CategoryDefinition {
                id: CategoryId::PeriodReminder,
                actions: vec![
                    ActionDefinition::new(MarkAsTracked, "Mark as Tracked", false, true),
                    ActionDefinition::new(RemindLater, "Remind in 1 hour", true, false),
                ],
                custom_dismiss: true,
            },
            CategoryDefinition {
                id: CategoryId::MedicationReminder,
                actions: vec![
                    ActionDefinition::new(MedicationTaken, "Taken", false, true),
                    ActionDefinition::new(MedicationSkip, "Skip", true, false),
                    ActionDefinition::new(MedicationRemind, "Remind in 30 minutes", true, false),
                ],
                custom_dismiss: true,
            },
            CategoryDefinition {
                id: CategoryId::FertilityAlert,
                actions: vec![ActionDefinition::new(
                    ViewFertilityDetails,
                    "View Details",
                    false,
                    true,
                )],
                custom_dismiss: true,
            },
        ];

        Self {
            catalog,
            installs: AtomicUsize::new(0),
        }
    }

    /// Install the whole catalog with the notifier, replacing whatever set
    /// it held before. Safe to call any number of times.
    pub async fn register_all(&self, notifier: &dyn Notifier) -> Result<(), ReminderError> {
        notifier
            .install_categories(&self.catalog)
            .await
            .map_err(ReminderError::from_notifier)?;
        let installs = self.installs.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            categories = self.catalog.len(),
            installs, "Notification categories installed"
        );
        Ok(())
    }

    pub fn lookup(&self, id: CategoryId) -> Result<&CategoryDefinition, ReminderError> {
        self.catalog
            .iter()
            .find(|c| c.id == id)
            .ok_or(ReminderError::UnknownCategory(id))
    }

    pub fn contains_action(&self, category: CategoryId, action: ActionId) -> bool {
        self.lookup(category)
            .map(|c| c.action(action).is_some())
            .unwrap_or(false)
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.catalog
    }

    /// Number of successful `register_all` calls.
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifierError;
    use crate::notifier::recording::RecordingNotifier;

    #[test]
    fn test_catalog_matches_published_table() {
        let registry = CategoryRegistry::standard();
        let table: Vec<(CategoryId, Vec<(&str, bool)>)> = registry
            .categories()
            .iter()
            .map(|c| {
                (
                    c.id,
                    c.actions
                        .iter()
                        .map(|a| (a.id.as_str(), a.destructive))
                        .collect(),
                )
            })
            .collect();

        assert_eq!(
            table,
            vec![
                (
                    CategoryId::PeriodReminder,
                    vec![("MARK_AS_TRACKED", false), ("REMIND_LATER", true)]
                ),
                (
                    CategoryId::MedicationReminder,
                    vec![
                        ("MEDICATION_TAKEN", false),
                        ("MEDICATION_SKIP", true),
                        ("MEDICATION_REMIND", true)
                    ]
                ),
                (
                    CategoryId::FertilityAlert,
                    vec![("VIEW_FERTILITY_DETAILS", false)]
                ),
            ]
        );
    }

    #[test]
    fn test_foreground_flags() {
        let registry = CategoryRegistry::standard();
        let period = registry.lookup(CategoryId::PeriodReminder).unwrap();
        assert!(period.action(ActionId::MarkAsTracked).unwrap().foreground);
        assert!(!period.action(ActionId::RemindLater).unwrap().foreground);
        assert!(period.custom_dismiss);
    }

    #[test]
    fn test_lookup_every_category() {
        let registry = CategoryRegistry::standard();
        for id in CategoryId::ALL {
            assert_eq!(registry.lookup(id).unwrap().id, id);
        }
    }

    #[test]
    fn test_contains_action() {
        let registry = CategoryRegistry::standard();
        assert!(registry.contains_action(CategoryId::MedicationReminder, ActionId::MedicationSkip));
        assert!(!registry.contains_action(CategoryId::FertilityAlert, ActionId::MedicationTaken));
        assert!(!registry.contains_action(CategoryId::PeriodReminder, ActionId::MedicationRemind));
    }

    #[test]
    fn test_action_id_round_trip() {
        for action in [
            ActionId::MarkAsTracked,
            ActionId::RemindLater,
            ActionId::MedicationTaken,
            ActionId::MedicationSkip,
            ActionId::MedicationRemind,
            ActionId::ViewFertilityDetails,
        ] {
            assert_eq!(action.as_str().parse::<ActionId>().unwrap(), action);
        }
        assert!("SNOOZE".parse::<ActionId>().is_err());
    }

    #[test]
    fn test_snooze_offsets() {
        assert_eq!(ActionId::RemindLater.snooze_secs(), Some(3600));
        assert_eq!(ActionId::MedicationRemind.snooze_secs(), Some(1800));
        assert_eq!(ActionId::MedicationTaken.snooze_secs(), None);
    }

    #[tokio::test]
    async fn test_register_all_replaces_wholesale_and_is_idempotent() {
        let notifier = RecordingNotifier::new();
        let registry = CategoryRegistry::standard();

        registry.register_all(&notifier).await.unwrap();
        registry.register_all(&notifier).await.unwrap();

        assert_eq!(registry.install_count(), 2);
        assert_eq!(notifier.category_installs(), 2);
        assert_eq!(notifier.installed_categories(), registry.categories().to_vec());
    }

    #[tokio::test]
    async fn test_register_all_surfaces_rejection() {
        let notifier = RecordingNotifier::new();
        notifier.reject_with(NotifierError::PermissionDenied);
        let registry = CategoryRegistry::standard();

        let err = registry.register_all(&notifier).await.unwrap_err();
        assert!(matches!(err, ReminderError::SchedulingFailed { .. }));
        assert_eq!(registry.install_count(), 0);
    }
}
