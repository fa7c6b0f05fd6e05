//! Request-time access gate.
//!
//! Classifies a request path into an area and decides, from the caller's
//! account kind and membership, whether the request proceeds or is
//! redirected. Stateless: everything it needs is passed in.

use serde::Serialize;

use crate::identity::{AccountKind, SignInSurface};
use crate::membership::MembershipRole;

pub const OWNER_AREA_ROOT: &str = "/dashboard";
pub const TEAM_AREA_ROOT: &str = "/team";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerPage {
    Home,
    Projects,
    Tasks,
    Clients,
    Payments,
    Expenses,
    Team,
    Settings,
}

impl OwnerPage {
    fn from_segment(segment: Option<&str>) -> Self {
        match segment {
            Some("projects") => OwnerPage::Projects,
            Some("tasks") => OwnerPage::Tasks,
            Some("clients") => OwnerPage::Clients,
            Some("payments") => OwnerPage::Payments,
            Some("expenses") => OwnerPage::Expenses,
            Some("team") => OwnerPage::Team,
            Some("settings") => OwnerPage::Settings,
            _ => OwnerPage::Home,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            OwnerPage::Home => "/dashboard",
            OwnerPage::Projects => "/dashboard/projects",
            OwnerPage::Tasks => "/dashboard/tasks",
            OwnerPage::Clients => "/dashboard/clients",
            OwnerPage::Payments => "/dashboard/payments",
            OwnerPage::Expenses => "/dashboard/expenses",
            OwnerPage::Team => "/dashboard/team",
            OwnerPage::Settings => "/dashboard/settings",
        }
    }

    /// Nearest team-area page; falls back to the team home.
    pub fn team_equivalent(&self) -> TeamPage {
        match self {
            OwnerPage::Projects => TeamPage::Projects,
            OwnerPage::Tasks => TeamPage::Tasks,
            OwnerPage::Payments => TeamPage::Payments,
            _ => TeamPage::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamPage {
    Home,
    Projects,
    Tasks,
    Payments,
    Profile,
}

impl TeamPage {
    fn from_segment(segment: Option<&str>) -> Self {
        match segment {
            Some("projects") => TeamPage::Projects,
            Some("tasks") => TeamPage::Tasks,
            Some("payments") => TeamPage::Payments,
            Some("profile") => TeamPage::Profile,
            _ => TeamPage::Home,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            TeamPage::Home => "/team",
            TeamPage::Projects => "/team/projects",
            TeamPage::Tasks => "/team/tasks",
            TeamPage::Payments => "/team/payments",
            TeamPage::Profile => "/team/profile",
        }
    }

    pub fn owner_equivalent(&self) -> OwnerPage {
        match self {
            TeamPage::Home => OwnerPage::Home,
            TeamPage::Projects => OwnerPage::Projects,
            TeamPage::Tasks => OwnerPage::Tasks,
            TeamPage::Payments => OwnerPage::Payments,
            TeamPage::Profile => OwnerPage::Settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "area", content = "page")]
pub enum Area {
    Public,
    SignIn(SignInSurface),
    Owner(OwnerPage),
    Team(TeamPage),
    /// JSON API: authenticated, but not bound to either page area.
    Api,
}

/// Map a request path to its area. Matching is per path segment, so
/// `/teams` is public while `/team/tasks` is the team area.
pub fn classify(path: &str) -> Area {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next();
    let second = segments.next();
    let third = segments.next();

    match (first, second, third) {
        (Some("auth"), Some("sign-in"), None) => Area::SignIn(SignInSurface::Owner),
        (Some("auth"), Some("team"), Some("sign-in")) => Area::SignIn(SignInSurface::Team),
        (Some("api"), _, _) => Area::Api,
        (Some("dashboard"), page, _) => Area::Owner(OwnerPage::from_segment(page)),
        (Some("team"), page, _) => Area::Team(TeamPage::from_segment(page)),
        _ => Area::Public,
    }
}

/// What the gate knows about an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateActor<'a> {
    pub kind: AccountKind,
    /// `None` when the account has no active membership.
    pub role: Option<&'a MembershipRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    SignInRequired,
    AlreadySignedIn,
    WrongArea,
    NoMembership,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Redirect {
        to: &'static str,
        reason: RedirectReason,
    },
    /// API request without a valid session: answer with a login prompt.
    LoginRequired,
}

pub fn home_path(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Owner => OwnerPage::Home.path(),
        AccountKind::TeamMember => TeamPage::Home.path(),
    }
}

/// The gate state machine: `(actor, area) → proceed | redirect`.
pub fn gate(actor: Option<GateActor<'_>>, area: Area) -> GateDecision {
    let redirect = |to, reason| GateDecision::Redirect { to, reason };

    match (area, actor) {
        (Area::Public, _) => GateDecision::Proceed,

        (Area::Api, None) => GateDecision::LoginRequired,
        (Area::Api, Some(_)) => GateDecision::Proceed,

        (Area::SignIn(_), None) => GateDecision::Proceed,
        (Area::SignIn(_), Some(a)) => redirect(home_path(a.kind), RedirectReason::AlreadySignedIn),

        (Area::Owner(_), None) => {
            redirect(SignInSurface::Owner.entry_path(), RedirectReason::SignInRequired)
        }
        (Area::Team(_), None) => {
            redirect(SignInSurface::Team.entry_path(), RedirectReason::SignInRequired)
        }

        (Area::Owner(page), Some(a)) => match a.kind {
            AccountKind::Owner => GateDecision::Proceed,
            AccountKind::TeamMember => {
                let target = if a.role.is_some() {
                    page.team_equivalent()
                } else {
                    TeamPage::Home
                };
                redirect(target.path(), RedirectReason::WrongArea)
            }
        },

        (Area::Team(page), Some(a)) => match a.kind {
            AccountKind::Owner => redirect(page.owner_equivalent().path(), RedirectReason::WrongArea),
            AccountKind::TeamMember => {
                if a.role.is_none() && page != TeamPage::Home {
                    redirect(TeamPage::Home.path(), RedirectReason::NoMembership)
                } else {
                    GateDecision::Proceed
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> GateActor<'static> {
        GateActor {
            kind: AccountKind::Owner,
            role: Some(&MembershipRole::Owner),
        }
    }

    fn member(role: Option<&MembershipRole>) -> GateActor<'_> {
        GateActor {
            kind: AccountKind::TeamMember,
            role,
        }
    }

    fn redirect_target(d: GateDecision) -> &'static str {
        match d {
            GateDecision::Redirect { to, .. } => to,
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn classification_is_segment_based() {
        assert_eq!(classify("/"), Area::Public);
        assert_eq!(classify("/teams"), Area::Public);
        assert_eq!(classify("/dashboardx"), Area::Public);
        assert_eq!(classify("/auth/sign-in"), Area::SignIn(SignInSurface::Owner));
        assert_eq!(classify("/auth/team/sign-in"), Area::SignIn(SignInSurface::Team));
        assert_eq!(classify("/auth/sign-out"), Area::Public);
        assert_eq!(classify("/api/whoami"), Area::Api);
        assert_eq!(classify("/dashboard"), Area::Owner(OwnerPage::Home));
        assert_eq!(classify("/dashboard/projects/42"), Area::Owner(OwnerPage::Projects));
        assert_eq!(classify("/team/tasks/"), Area::Team(TeamPage::Tasks));
    }

    #[test]
    fn unauthenticated_visitors_go_to_matching_sign_in() {
        assert_eq!(redirect_target(gate(None, classify("/dashboard/tasks"))), "/auth/sign-in");
        assert_eq!(redirect_target(gate(None, classify("/team/tasks"))), "/auth/team/sign-in");
        assert_eq!(gate(None, classify("/api/whoami")), GateDecision::LoginRequired);
        assert_eq!(gate(None, classify("/health")), GateDecision::Proceed);
    }

    #[test]
    fn owner_in_team_area_goes_to_owner_equivalent() {
        assert_eq!(redirect_target(gate(Some(owner()), classify("/team/projects"))), "/dashboard/projects");
        assert_eq!(redirect_target(gate(Some(owner()), classify("/team/profile"))), "/dashboard/settings");
        assert_eq!(gate(Some(owner()), classify("/dashboard/clients")), GateDecision::Proceed);
    }

    #[test]
    fn team_member_in_owner_area_goes_to_nearest_team_page() {
        let role = MembershipRole::functional("developer").unwrap();
        let m = member(Some(&role));
        assert_eq!(redirect_target(gate(Some(m), classify("/dashboard/tasks"))), "/team/tasks");
        assert_eq!(redirect_target(gate(Some(m), classify("/dashboard/projects/9"))), "/team/projects");
        assert_eq!(redirect_target(gate(Some(m), classify("/dashboard/clients"))), "/team");
        assert_eq!(gate(Some(m), classify("/team/tasks")), GateDecision::Proceed);
    }

    #[test]
    fn signed_in_actor_at_sign_in_goes_home() {
        assert_eq!(redirect_target(gate(Some(owner()), classify("/auth/sign-in"))), "/dashboard");
        assert_eq!(
            redirect_target(gate(Some(member(None)), classify("/auth/sign-in"))),
            "/team"
        );
    }

    #[test]
    fn team_member_without_membership_is_held_at_team_home() {
        assert_eq!(gate(Some(member(None)), classify("/team")), GateDecision::Proceed);
        match gate(Some(member(None)), classify("/team/payments")) {
            GateDecision::Redirect { to, reason } => {
                assert_eq!(to, "/team");
                assert_eq!(reason, RedirectReason::NoMembership);
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }
}
