// File: tally-common/src/models/activity.rs
//
// Per-user progress records and the transitions every storage backend applies
// to them. Backends call these methods while holding their per-key lock, so
// each method here is a single atomic step.

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Pending,
    InProgress,
    Earned,
    Redeemed,
}

impl ActivityStatus {
    /// Position in the forward-only lifecycle.
    pub fn rank(self) -> u8 {
        match self {
            ActivityStatus::Pending => 0,
            ActivityStatus::InProgress => 1,
            ActivityStatus::Earned => 2,
            ActivityStatus::Redeemed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::InProgress => "in_progress",
            ActivityStatus::Earned => "earned",
            ActivityStatus::Redeemed => "redeemed",
        }
    }

    /// Earned or redeemed: the points for this activity count toward the total.
    pub fn is_completed(self) -> bool {
        matches!(self, ActivityStatus::Earned | ActivityStatus::Redeemed)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActivityStatus::Pending),
            "in_progress" => Ok(ActivityStatus::InProgress),
            "earned" => Ok(ActivityStatus::Earned),
            "redeemed" => Ok(ActivityStatus::Redeemed),
            other => Err(Error::Parse(format!("Unknown activity status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Looks the move up in [`VERIFICATION_TRANSITIONS`]; `None` means the
    /// move is not allowed.
    pub fn apply(self, event: VerificationEvent) -> Option<VerificationStatus> {
        VERIFICATION_TRANSITIONS
            .iter()
            .find(|(from, ev, _)| *from == self && *ev == event)
            .map(|(_, _, to)| *to)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(Error::Parse(format!("Unknown verification status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationEvent {
    /// Progress reached the target on a task that needs manual approval.
    Requested,
    Approve,
    Reject,
}

/// Every allowed verification move. A resolved decision is terminal: a later
/// `Requested` keeps it, and approved/rejected never flip into each other.
pub const VERIFICATION_TRANSITIONS: [(VerificationStatus, VerificationEvent, VerificationStatus); 7] = [
    (VerificationStatus::Pending, VerificationEvent::Requested, VerificationStatus::Pending),
    (VerificationStatus::Approved, VerificationEvent::Requested, VerificationStatus::Approved),
    (VerificationStatus::Rejected, VerificationEvent::Requested, VerificationStatus::Rejected),
    (VerificationStatus::Pending, VerificationEvent::Approve, VerificationStatus::Approved),
    (VerificationStatus::Pending, VerificationEvent::Reject, VerificationStatus::Rejected),
    (VerificationStatus::Approved, VerificationEvent::Approve, VerificationStatus::Approved),
    (VerificationStatus::Rejected, VerificationEvent::Reject, VerificationStatus::Rejected),
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationState {
    pub required: bool,
    pub status: VerificationStatus,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl VerificationState {
    /// The gate between "earned" and "claimable".
    pub fn is_satisfied(&self) -> bool {
        !self.required || self.status == VerificationStatus::Approved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Progress,
    Earned,
    VerificationRequested,
    VerificationApproved,
    VerificationRejected,
    Redeemed,
}

/// Immutable entry of an activity's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityHistoryEntry {
    pub action: HistoryAction,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor: Option<Uuid>,
    pub at: DateTime<Utc>,
}

/// Identity of a progress record: one per (user, reward, task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityKey {
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardActivity {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub task_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub status: ActivityStatus,
    pub progress_value: f64,
    pub progress_target: f64,
    pub points_awarded: i64,
    /// Claimed by exactly one payout through [`RewardActivity::mark_credited`];
    /// released again if that payout's ledger write fails.
    pub points_credited: bool,
    pub earned_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub voucher_code: Option<String>,
    pub verification: VerificationState,
    pub history: Vec<ActivityHistoryEntry>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of one progress step, resolved by the tracker against the template.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub key: ActivityKey,
    pub tenant_id: Option<Uuid>,
    pub amount: f64,
    pub progress_target: f64,
    pub points_awarded: i64,
    pub requires_verification: bool,
    pub note: Option<String>,
    pub metadata: Map<String, Value>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTransition {
    pub previous_status: ActivityStatus,
    /// This step moved the activity into "earned" for the first time.
    pub just_earned: bool,
    /// Points still owed to the ledger. The caller must win
    /// `mark_credited` before paying them out.
    pub credit_points: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub activity: RewardActivity,
    pub transition: ProgressTransition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone)]
pub struct VerificationResolution {
    pub decision: VerificationDecision,
    pub reviewer_id: Option<Uuid>,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationTransition {
    pub changed: bool,
    pub credit_points: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub activity: RewardActivity,
    pub transition: VerificationTransition,
}

/// Input of a claim, applied to one earned activity.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub voucher_code: Option<String>,
    pub note: Option<String>,
    pub issuer_id: Option<Uuid>,
    pub voucher_prefix: String,
    pub at: DateTime<Utc>,
}

impl RewardActivity {
    pub fn new(key: ActivityKey, tenant_id: Option<Uuid>, progress_target: f64, at: DateTime<Utc>) -> Self {
        Self {
            activity_id: Uuid::new_v4(),
            user_id: key.user_id,
            reward_id: key.reward_id,
            task_id: key.task_id,
            tenant_id,
            status: ActivityStatus::Pending,
            progress_value: 0.0,
            progress_target,
            points_awarded: 0,
            points_credited: false,
            earned_at: None,
            redeemed_at: None,
            voucher_code: None,
            verification: VerificationState::default(),
            history: Vec::new(),
            metadata: Map::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn key(&self) -> ActivityKey {
        ActivityKey {
            user_id: self.user_id,
            reward_id: self.reward_id,
            task_id: self.task_id,
        }
    }

    fn push_history(&mut self, action: HistoryAction, value: Option<f64>, note: Option<String>, actor: Option<Uuid>, at: DateTime<Utc>) {
        self.history.push(ActivityHistoryEntry { action, value, note, actor, at });
    }

    /// Adds progress and advances the lifecycle. Progress only accumulates and
    /// the status only moves forward.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) -> ProgressTransition {
        let previous_status = self.status;

        self.progress_value += update.amount;
        self.progress_target = update.progress_target;
        self.push_history(HistoryAction::Progress, Some(update.amount), update.note.clone(), None, update.at);
        for (k, v) in &update.metadata {
            self.metadata.insert(k.clone(), v.clone());
        }

        if self.progress_value >= self.progress_target && self.status != ActivityStatus::Redeemed {
            self.status = ActivityStatus::Earned;
            if self.earned_at.is_none() {
                self.earned_at = Some(update.at);
            }
            self.points_awarded = update.points_awarded;

            if update.requires_verification {
                let first_request = !self.verification.required;
                self.verification.required = true;
                if let Some(next) = self.verification.status.apply(VerificationEvent::Requested) {
                    self.verification.status = next;
                }
                if first_request {
                    self.push_history(HistoryAction::VerificationRequested, None, None, None, update.at);
                }
            }
        } else if self.status == ActivityStatus::Pending {
            self.status = ActivityStatus::InProgress;
        }

        let just_earned = self.status == ActivityStatus::Earned && previous_status != ActivityStatus::Earned;
        if just_earned {
            self.push_history(HistoryAction::Earned, Some(self.progress_value), None, None, update.at);
        }

        self.updated_at = update.at;
        ProgressTransition {
            previous_status,
            just_earned,
            credit_points: self.owed_points(),
        }
    }

    /// Applies a staff decision through [`VERIFICATION_TRANSITIONS`]. Approving
    /// an earned activity whose points are still held back releases them.
    pub fn resolve_verification(&mut self, resolution: &VerificationResolution) -> Result<VerificationTransition, Error> {
        if !self.verification.required {
            return Err(Error::InvalidTransition(format!(
                "activity {} does not require verification",
                self.activity_id
            )));
        }

        let (event, action) = match resolution.decision {
            VerificationDecision::Approve => (VerificationEvent::Approve, HistoryAction::VerificationApproved),
            VerificationDecision::Reject => (VerificationEvent::Reject, HistoryAction::VerificationRejected),
        };
        let current = self.verification.status;
        let next = current.apply(event).ok_or_else(|| {
            Error::InvalidTransition(format!(
                "verification of activity {} is already {}",
                self.activity_id, current
            ))
        })?;

        let changed = next != current;
        if changed {
            self.verification.status = next;
            self.verification.reviewed_by = resolution.reviewer_id;
            self.verification.reviewed_at = Some(resolution.at);
            self.push_history(action, None, resolution.note.clone(), resolution.reviewer_id, resolution.at);
            self.updated_at = resolution.at;
        }

        Ok(VerificationTransition {
            changed,
            credit_points: self.owed_points(),
        })
    }

    /// Points of a completed, verified activity that no payout has claimed yet.
    pub fn owed_points(&self) -> Option<i64> {
        if self.status.is_completed() && self.verification.is_satisfied() && !self.points_credited {
            Some(self.points_awarded)
        } else {
            None
        }
    }

    /// Compare-and-set on `points_credited`. Only the call that flips it
    /// gets `true` and may write to the ledger.
    pub fn mark_credited(&mut self, at: DateTime<Utc>) -> bool {
        if self.points_credited {
            return false;
        }
        self.points_credited = true;
        self.updated_at = at;
        true
    }

    /// Undoes a `mark_credited` whose ledger write failed.
    pub fn release_credit(&mut self, at: DateTime<Utc>) {
        self.points_credited = false;
        self.updated_at = at;
    }

    /// Moves an earned, verified activity to "redeemed".
    ///
    /// Voucher precedence is existing code, then the caller's code, then a
    /// generated one. An activity never loses a code it already carries, so
    /// a caller-supplied code does not overwrite an imported one.
    pub fn redeem(&mut self, redemption: &Redemption) -> Result<(), Error> {
        if self.status != ActivityStatus::Earned {
            return Err(Error::NotFound("Reward not ready for redemption".into()));
        }
        if self.verification.required {
            match self.verification.status {
                VerificationStatus::Approved => {}
                VerificationStatus::Pending => {
                    return Err(Error::VerificationPending(format!(
                        "activity {} is pending staff verification",
                        self.activity_id
                    )));
                }
                VerificationStatus::Rejected => {
                    return Err(Error::VerificationRejected(format!(
                        "activity {} was rejected by staff",
                        self.activity_id
                    )));
                }
            }
        }

        self.status = ActivityStatus::Redeemed;
        self.redeemed_at = Some(redemption.at);
        if self.voucher_code.is_none() {
            self.voucher_code = Some(
                redemption
                    .voucher_code
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| generate_voucher_code(&redemption.voucher_prefix, redemption.at)),
            );
        }
        self.push_history(HistoryAction::Redeemed, None, redemption.note.clone(), redemption.issuer_id, redemption.at);
        self.updated_at = redemption.at;
        Ok(())
    }
}

/// `<PREFIX>-<base36 millis>`, uppercased.
pub fn generate_voucher_code(prefix: &str, at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis().max(0) as u64;
    format!("{}-{}", prefix, to_base36(millis)).to_uppercase()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> ActivityKey {
        ActivityKey {
            user_id: Uuid::new_v4(),
            reward_id: Uuid::new_v4(),
            task_id: Some(Uuid::new_v4()),
        }
    }

    fn update(key: ActivityKey, amount: f64, target: f64, verify: bool) -> ProgressUpdate {
        ProgressUpdate {
            key,
            tenant_id: None,
            amount,
            progress_target: target,
            points_awarded: 50,
            requires_verification: verify,
            note: None,
            metadata: Map::new(),
            at: Utc::now(),
        }
    }

    fn redemption(code: Option<&str>) -> Redemption {
        Redemption {
            voucher_code: code.map(String::from),
            note: Some("claimed at front desk".into()),
            issuer_id: None,
            voucher_prefix: "RV".into(),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_moves_pending_to_in_progress_to_earned() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 3.0, Utc::now());

        let t1 = act.apply_progress(&update(k, 1.0, 3.0, false));
        assert_eq!(act.status, ActivityStatus::InProgress);
        assert!(!t1.just_earned);
        assert_eq!(t1.credit_points, None);

        act.apply_progress(&update(k, 1.0, 3.0, false));
        let t3 = act.apply_progress(&update(k, 1.0, 3.0, false));
        assert_eq!(act.status, ActivityStatus::Earned);
        assert!(t3.just_earned);
        assert_eq!(t3.credit_points, Some(50));
        assert_eq!(act.progress_value, 3.0);
        assert!(act.earned_at.is_some());
    }

    #[test]
    fn test_progress_after_earning_never_credits_again() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 1.0, Utc::now());
        let first = act.apply_progress(&update(k, 1.0, 1.0, false));
        assert!(act.mark_credited(Utc::now()));
        let earned_at = act.earned_at;
        let again = act.apply_progress(&update(k, 1.0, 1.0, false));

        assert_eq!(first.credit_points, Some(50));
        assert_eq!(again.credit_points, None);
        assert!(!again.just_earned);
        assert_eq!(act.status, ActivityStatus::Earned);
        assert_eq!(act.earned_at, earned_at);
        assert_eq!(act.progress_value, 2.0);
    }

    #[test]
    fn test_verification_holds_back_points_until_approved() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 1.0, Utc::now());
        let t = act.apply_progress(&update(k, 1.0, 1.0, true));

        assert!(t.just_earned);
        assert_eq!(t.credit_points, None);
        assert!(act.verification.required);
        assert_eq!(act.verification.status, VerificationStatus::Pending);

        let reviewer = Uuid::new_v4();
        let v = act
            .resolve_verification(&VerificationResolution {
                decision: VerificationDecision::Approve,
                reviewer_id: Some(reviewer),
                note: None,
                at: Utc::now(),
            })
            .unwrap();
        assert!(v.changed);
        assert_eq!(v.credit_points, Some(50));
        assert_eq!(act.verification.reviewed_by, Some(reviewer));
        assert!(act.mark_credited(Utc::now()));

        // A repeated approval is a no-op and credits nothing.
        let again = act
            .resolve_verification(&VerificationResolution {
                decision: VerificationDecision::Approve,
                reviewer_id: Some(reviewer),
                note: None,
                at: Utc::now(),
            })
            .unwrap();
        assert!(!again.changed);
        assert_eq!(again.credit_points, None);
    }

    #[test]
    fn test_unclaimed_points_stay_owed_until_marked() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 1.0, Utc::now());
        let first = act.apply_progress(&update(k, 1.0, 1.0, false));
        assert_eq!(first.credit_points, Some(50));

        // The payout never claimed them: a later step reports them again.
        let retry = act.apply_progress(&update(k, 0.0, 1.0, false));
        assert!(!retry.just_earned);
        assert_eq!(retry.credit_points, Some(50));

        assert!(act.mark_credited(Utc::now()));
        assert!(!act.mark_credited(Utc::now()));
        assert_eq!(act.owed_points(), None);

        act.release_credit(Utc::now());
        assert_eq!(act.owed_points(), Some(50));
    }

    #[test]
    fn test_resolved_verification_is_not_regressed_by_progress() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 1.0, Utc::now());
        act.apply_progress(&update(k, 1.0, 1.0, true));
        act.resolve_verification(&VerificationResolution {
            decision: VerificationDecision::Reject,
            reviewer_id: None,
            note: Some("photo missing".into()),
            at: Utc::now(),
        })
        .unwrap();

        act.apply_progress(&update(k, 1.0, 1.0, true));
        assert_eq!(act.verification.status, VerificationStatus::Rejected);
    }

    #[test]
    fn test_transition_table_forbids_flipping_a_decision() {
        assert_eq!(VerificationStatus::Approved.apply(VerificationEvent::Reject), None);
        assert_eq!(VerificationStatus::Rejected.apply(VerificationEvent::Approve), None);
        assert_eq!(
            VerificationStatus::Pending.apply(VerificationEvent::Approve),
            Some(VerificationStatus::Approved)
        );
    }

    #[test]
    fn test_redeem_requires_earned_and_verified() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 2.0, Utc::now());
        act.apply_progress(&update(k, 1.0, 2.0, false));
        assert!(matches!(act.redeem(&redemption(None)), Err(Error::NotFound(_))));

        act.apply_progress(&update(k, 1.0, 2.0, true));
        let err = act.redeem(&redemption(None)).unwrap_err();
        assert!(matches!(err, Error::VerificationPending(_)));
        assert!(err.to_string().contains("awaiting staff approval"));
        assert_eq!(act.status, ActivityStatus::Earned);
    }

    #[test]
    fn test_redeem_keeps_existing_voucher_code() {
        let k = key();
        let mut act = RewardActivity::new(k, None, 1.0, Utc::now());
        act.apply_progress(&update(k, 1.0, 1.0, false));
        act.voucher_code = Some("RV-PRESET".into());

        act.redeem(&redemption(Some("RV-OTHER"))).unwrap();
        assert_eq!(act.voucher_code.as_deref(), Some("RV-PRESET"));
        assert_eq!(act.status, ActivityStatus::Redeemed);
        assert!(matches!(act.redeem(&redemption(None)), Err(Error::NotFound(_))));
        assert_eq!(act.voucher_code.as_deref(), Some("RV-PRESET"));
    }

    #[test]
    fn test_generated_voucher_code_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let code = generate_voucher_code("rv", at);
        assert!(code.starts_with("RV-"));
        assert_eq!(code, code.to_uppercase());
        let millis = u64::from_str_radix(&code[3..].to_lowercase(), 36).unwrap();
        assert_eq!(millis as i64, at.timestamp_millis());
    }
}
