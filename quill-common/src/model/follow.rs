use crate::model::{Id, user::UserMarker};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum FollowError {
    #[error("Users cannot follow themselves")]
    SelfFollow,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Follow {
    user: Id<UserMarker>,
    author: Id<UserMarker>,
}

impl Follow {
    pub fn new(user: Id<UserMarker>, author: Id<UserMarker>) -> Result<Self, FollowError> {
        if user == author {
            Err(FollowError::SelfFollow)
        } else {
            Ok(Self { user, author })
        }
    }

    #[must_use]
    pub fn user(self) -> Id<UserMarker> {
        self.user
    }

    #[must_use]
    pub fn author(self) -> Id<UserMarker> {
        self.author
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        follow::{Follow, FollowError},
    };

    #[test]
    fn self_follow_is_rejected() {
        assert_eq!(Follow::new(Id::new(3), Id::new(3)), Err(FollowError::SelfFollow));

        let follow = Follow::new(Id::new(3), Id::new(4)).unwrap();
        assert_eq!(follow.user(), Id::new(3));
        assert_eq!(follow.author(), Id::new(4));
    }
}
