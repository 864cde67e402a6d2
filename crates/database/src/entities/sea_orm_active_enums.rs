use sea_orm::entity::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum JobStatus {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "DISPUTED")]
    Disputed,
    /// No escrow event moves a job here yet.
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    /// Whether a job currently in `self` may move to `next`.
    ///
    /// Resubmission after a revision request keeps a job in `Submitted`, so
    /// that self-transition is allowed. Everything else only moves forward.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, next),
            (Created, Submitted)
                | (Submitted, Submitted)
                | (Submitted, Approved)
                | (Created, Disputed)
                | (Submitted, Disputed)
                | (Created, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Approved | JobStatus::Disputed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Approved => "APPROVED",
            JobStatus::Disputed => "DISPUTED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum StakeEventKind {
    #[sea_orm(string_value = "REGISTERED")]
    Registered,
    #[sea_orm(string_value = "ADDED")]
    Added,
    #[sea_orm(string_value = "WITHDRAWN")]
    Withdrawn,
    #[sea_orm(string_value = "LOCKED")]
    Locked,
    #[sea_orm(string_value = "UNLOCKED")]
    Unlocked,
}

/// Escrow log kinds that change a job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum JobEventKind {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "DISPUTED")]
    Disputed,
    #[sea_orm(string_value = "PAID")]
    PaymentReleased,
}
