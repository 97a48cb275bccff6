//! The server-side player record.

use plaza_protocol::{Location, PlayerId, PlayerSnapshot, PrivilegeUpdate, Privileges};

/// One avatar inside one town.
///
/// Owned exclusively by the town's controller. Nothing outside the
/// controller mutates a player; everyone else sees [`PlayerSnapshot`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Display name. Also the identity the ban list matches against.
    pub user_name: String,
    pub location: Location,
    pub privileges: Privileges,
}

impl Player {
    /// A fresh player at the origin with every capability except admin.
    pub fn new(id: PlayerId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            location: Location::default(),
            privileges: Privileges::default(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.privileges.admin
    }

    /// Applies the fields that are present in `update`.
    ///
    /// Promotion (`is_admin: Some(true)`) always restores audio, video,
    /// and chat, overriding whatever else the update says about them.
    pub fn apply_privileges(&mut self, update: PrivilegeUpdate) {
        let p = &mut self.privileges;
        if let Some(video) = update.video {
            p.video = video;
        }
        if let Some(audio) = update.audio {
            p.audio = audio;
        }
        if let Some(chat) = update.chat {
            p.chat = chat;
        }
        if let Some(admin) = update.is_admin {
            p.admin = admin;
            if admin {
                p.video = true;
                p.audio = true;
                p.chat = true;
            }
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            user_name: self.user_name.clone(),
            location: self.location,
            privileges: self.privileges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId(1), "ada")
    }

    #[test]
    fn test_new_defaults_everything_but_admin() {
        let p = player();
        assert!(p.privileges.audio && p.privileges.video && p.privileges.chat);
        assert!(!p.is_admin());
        assert_eq!(p.location, Location::default());
    }

    #[test]
    fn test_apply_privileges_only_given_fields() {
        let mut p = player();
        p.apply_privileges(PrivilegeUpdate {
            video: Some(false),
            ..PrivilegeUpdate::default()
        });

        assert!(!p.privileges.video);
        assert!(p.privileges.audio);
        assert!(p.privileges.chat);
        assert!(!p.is_admin());
    }

    #[test]
    fn test_apply_privileges_promotion_restores_capabilities() {
        let mut p = player();
        p.privileges.audio = false;
        p.privileges.video = false;
        p.privileges.chat = false;

        p.apply_privileges(PrivilegeUpdate {
            video: Some(false),
            is_admin: Some(true),
            ..PrivilegeUpdate::default()
        });

        assert_eq!(
            p.privileges,
            Privileges {
                audio: true,
                video: true,
                chat: true,
                admin: true
            }
        );
    }

    #[test]
    fn test_apply_privileges_demotion_keeps_capabilities() {
        let mut p = player();
        p.privileges.admin = true;
        p.privileges.chat = false;

        p.apply_privileges(PrivilegeUpdate {
            is_admin: Some(false),
            ..PrivilegeUpdate::default()
        });

        assert!(!p.is_admin());
        assert!(!p.privileges.chat);
    }

    #[test]
    fn test_snapshot_copies_state() {
        let mut p = player();
        p.location = Location::at(3.0, 4.0);
        let snap = p.snapshot();
        assert_eq!(snap.id, PlayerId(1));
        assert_eq!(snap.user_name, "ada");
        assert_eq!(snap.location, Location::at(3.0, 4.0));
    }
}
