use std::collections::BTreeMap;

use chrono::Utc;

use huddle_shared::types::sorted_pair;
use huddle_shared::{ChatId, GroupId, UserId};

use crate::database::Database;
use crate::models::{DirectChat, GroupChat, GroupMember, ProfileSnapshot, User};

pub(crate) fn user(id: &str, username: &str, name: Option<&str>) -> User {
    let now = Utc::now();
    User {
        id: UserId::from(id),
        username: username.to_string(),
        display_name: name.map(str::to_string),
        avatar_ref: None,
        created_at: now,
        updated_at: now,
    }
}

/// In-memory database seeded with users `u1`..`u4`.
pub(crate) fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol"), ("u4", "dave")] {
        db.upsert_user(&user(id, name, None)).unwrap();
    }
    db
}

pub(crate) fn chat_between(a: &str, b: &str) -> DirectChat {
    let now = Utc::now();
    let a = UserId::from(a);
    let b = UserId::from(b);
    let (lo, hi) = sorted_pair(&a, &b);
    let mut participant_profiles = BTreeMap::new();
    participant_profiles.insert(a.clone(), ProfileSnapshot::placeholder("A"));
    participant_profiles.insert(b.clone(), ProfileSnapshot::placeholder("B"));
    DirectChat {
        id: ChatId::for_pair(&a, &b),
        participants: [lo.clone(), hi.clone()],
        participant_profiles,
        created_at: now,
        updated_at: now,
        last_message: None,
    }
}

/// Seeded database with a stored chat between `u1` and `u2`.
pub(crate) fn db_with_chat() -> (Database, ChatId) {
    let db = seeded_db();
    let chat = chat_between("u1", "u2");
    db.insert_direct_chat_if_absent(&chat).unwrap();
    (db, chat.id)
}

pub(crate) fn member(id: &str) -> GroupMember {
    GroupMember {
        user_id: UserId::from(id),
        profile: ProfileSnapshot::placeholder(id),
        joined_at: Utc::now(),
    }
}

/// Unsaved group named "crew" owned by `owner`, members in the given order.
pub(crate) fn sample_group(owner: &str, others: &[&str]) -> GroupChat {
    let now = Utc::now();
    let mut members = vec![member(owner)];
    members.extend(others.iter().map(|id| member(id)));
    GroupChat {
        id: GroupId::new(),
        name: "crew".to_string(),
        owner_id: UserId::from(owner),
        members,
        created_at: now,
        updated_at: now,
        last_message: None,
    }
}

/// Seeded database with a stored group owned by `u1` with `u2` and `u3`.
pub(crate) fn db_with_group() -> (Database, GroupId) {
    let mut db = seeded_db();
    let group = sample_group("u1", &["u2", "u3"]);
    db.create_group(&group).unwrap();
    (db, group.id)
}
