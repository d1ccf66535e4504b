use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

//
// ─── ROLES ─────────────────────────────────────────────────────────────────────
//

/// What a user may do. Every role decision goes through [`Role::capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Supervisor,
    Instructor,
    #[default]
    Student,
    ThirdParty,
}

/// Permission table row for a [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RoleCapabilities {
    pub manage_users: bool,
    pub build_paths: bool,
    pub author_any_course: bool,
    pub author_own_courses: bool,
    pub view_all_reports: bool,
    pub view_course_reports: bool,
    pub enroll_in_content: bool,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Supervisor,
        Role::Instructor,
        Role::Student,
        Role::ThirdParty,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Instructor => "instructor",
            Role::Student => "student",
            Role::ThirdParty => "third_party",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Supervisor => "Supervisor",
            Role::Instructor => "Instructor",
            Role::Student => "Student",
            Role::ThirdParty => "Third-Party Client",
        }
    }

    #[must_use]
    pub fn capabilities(self) -> RoleCapabilities {
        match self {
            Role::Admin => RoleCapabilities {
                manage_users: true,
                build_paths: true,
                author_any_course: true,
                author_own_courses: true,
                view_all_reports: true,
                view_course_reports: true,
                enroll_in_content: false,
            },
            Role::Supervisor => RoleCapabilities {
                manage_users: false,
                build_paths: true,
                author_any_course: false,
                author_own_courses: false,
                view_all_reports: false,
                view_course_reports: true,
                enroll_in_content: false,
            },
            Role::Instructor => RoleCapabilities {
                manage_users: false,
                build_paths: false,
                author_any_course: false,
                author_own_courses: true,
                view_all_reports: false,
                view_course_reports: false,
                enroll_in_content: false,
            },
            Role::Student => RoleCapabilities {
                manage_users: false,
                build_paths: false,
                author_any_course: false,
                author_own_courses: false,
                view_all_reports: false,
                view_course_reports: false,
                enroll_in_content: true,
            },
            Role::ThirdParty => RoleCapabilities {
                manage_users: false,
                build_paths: false,
                author_any_course: false,
                author_own_courses: false,
                view_all_reports: false,
                view_course_reports: false,
                enroll_in_content: false,
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UserError::UnknownRole(s.to_owned()))
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    full_name: String,
    email: String,
    role: Role,
}

impl User {
    /// # Errors
    ///
    /// Returns `UserError::EmptyUsername` if the username is blank.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Result<Self, UserError> {
        let username = username.into().trim().to_owned();
        if username.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        Ok(Self {
            id,
            username,
            full_name: full_name.into().trim().to_owned(),
            email: email.into().trim().to_owned(),
            role,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Full name when set, username otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    #[must_use]
    pub fn can(&self, check: impl FnOnce(RoleCapabilities) -> bool) -> bool {
        check(self.role.capabilities())
    }
}
