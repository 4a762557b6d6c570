//! Group Chat Registry: creation, membership, ownership transfer and
//! disbandment.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use huddle_shared::constants::{FALLBACK_MEMBER_NAME, MAX_GROUP_NAME_LEN};
use huddle_shared::{ChatError, ChatResult, GroupId, UserId};
use huddle_store::{GroupChat, GroupMember, StoreHandle};

use crate::events::MessageEvent;
use crate::ext::OrNotFound;
use crate::notifications::NotificationEmitter;
use crate::now;
use crate::streams::GroupStreams;

/// What `remove_member` did to the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemovalOutcome {
    Removed,
    OwnershipTransferred { new_owner: UserId },
    /// The owner was the last member; the group and its messages are gone.
    GroupDeleted,
}

/// A group as listed for one user.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: GroupChat,
    pub unread: u64,
}

#[derive(Clone)]
pub struct Groups {
    store: StoreHandle,
    streams: Arc<GroupStreams>,
    notifier: NotificationEmitter,
}

impl Groups {
    pub fn new(
        store: StoreHandle,
        streams: Arc<GroupStreams>,
        notifier: NotificationEmitter,
    ) -> Self {
        Self {
            store,
            streams,
            notifier,
        }
    }

    /// Create a group owned by `founder`.  The founder joins first, then the
    /// other members in the order given (duplicates ignored).
    pub async fn create_group(
        &self,
        founder: &UserId,
        name: &str,
        member_ids: &[UserId],
    ) -> ChatResult<GroupChat> {
        let name = validate_name(name)?;
        if founder.is_blank() {
            return Err(ChatError::invalid("founder id is empty"));
        }

        let mut others: Vec<UserId> = Vec::new();
        for id in member_ids {
            if id.is_blank() {
                return Err(ChatError::invalid("member id is empty"));
            }
            if id != founder && !others.contains(id) {
                others.push(id.clone());
            }
        }
        if others.is_empty() {
            return Err(ChatError::invalid(
                "a group needs at least one member besides the founder",
            ));
        }

        let founder = founder.clone();
        self.store
            .call(move |db| {
                let now = now();
                let mut members = Vec::with_capacity(others.len() + 1);
                for id in std::iter::once(&founder).chain(others.iter()) {
                    let user = db.get_user(id).or_not_found(|| format!("user {id}"))?;
                    members.push(GroupMember {
                        user_id: id.clone(),
                        profile: user.snapshot(FALLBACK_MEMBER_NAME),
                        joined_at: now,
                    });
                }

                let group = GroupChat {
                    id: GroupId::new(),
                    name,
                    owner_id: founder.clone(),
                    members,
                    created_at: now,
                    updated_at: now,
                    last_message: None,
                };
                db.create_group(&group)?;

                info!(
                    group = %group.id,
                    owner = %founder,
                    members = group.members.len(),
                    "Created group"
                );
                Ok(group)
            })
            .await
    }

    /// Add `user` to the group and send them an invite notification.
    pub async fn add_member(&self, group_id: GroupId, user: &UserId) -> ChatResult<GroupChat> {
        if user.is_blank() {
            return Err(ChatError::invalid("user id is empty"));
        }

        let new_member = user.clone();
        let group = self
            .store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                if group.is_member(&new_member) {
                    return Err(ChatError::AlreadyMember {
                        group: group_id,
                        user: new_member,
                    });
                }
                let profile = db
                    .get_user(&new_member)
                    .or_not_found(|| format!("user {new_member}"))?
                    .snapshot(FALLBACK_MEMBER_NAME);

                db.add_group_member(
                    group_id,
                    &GroupMember {
                        user_id: new_member.clone(),
                        profile,
                        joined_at: now(),
                    },
                )?;
                info!(group = %group_id, user = %new_member, "Added group member");
                Ok(db.get_group(group_id)?)
            })
            .await?;

        self.notifier
            .emit_group_invite(user, group_id, &group.name)
            .await;
        Ok(group)
    }

    /// Remove `target` from the group on behalf of `requester`.
    ///
    /// Only the owner may remove someone else; anyone may leave.  When the
    /// owner leaves, ownership passes to the earliest-joined remaining
    /// member, or the group is deleted if nobody remains.  Subscriptions held
    /// by the removed member end.
    pub async fn remove_member(
        &self,
        group_id: GroupId,
        target: &UserId,
        requester: &UserId,
    ) -> ChatResult<RemovalOutcome> {
        let target = target.clone();
        let requester = requester.clone();
        let streams = Arc::clone(&self.streams);
        let outcome = self
            .store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;

                if requester != group.owner_id && requester != target {
                    return Err(ChatError::forbidden(
                        "only the owner can remove other members",
                    ));
                }
                if !group.is_member(&target) {
                    return Err(ChatError::not_found(format!(
                        "user {target} is not a member of group {group_id}"
                    )));
                }

                if target != group.owner_id {
                    db.remove_group_member(group_id, &target, now())?;
                    streams.emit(
                        group_id,
                        MessageEvent::MemberRemoved {
                            user_id: target.clone(),
                        },
                    );
                    info!(group = %group_id, user = %target, "Removed group member");
                    return Ok(RemovalOutcome::Removed);
                }

                let successor = group
                    .members
                    .iter()
                    .find(|m| m.user_id != target)
                    .map(|m| m.user_id.clone());
                match successor {
                    Some(new_owner) => {
                        db.transfer_ownership_and_remove(group_id, &target, &new_owner, now())?;
                        streams.emit(
                            group_id,
                            MessageEvent::MemberRemoved {
                                user_id: target.clone(),
                            },
                        );
                        info!(
                            group = %group_id,
                            old_owner = %target,
                            new_owner = %new_owner,
                            "Owner left, ownership transferred"
                        );
                        Ok(RemovalOutcome::OwnershipTransferred { new_owner })
                    }
                    None => {
                        db.delete_group(group_id)?;
                        info!(group = %group_id, "Last member left, group deleted");
                        Ok(RemovalOutcome::GroupDeleted)
                    }
                }
            })
            .await?;

        if outcome == RemovalOutcome::GroupDeleted {
            self.streams.close(group_id);
        }
        Ok(outcome)
    }

    pub async fn rename_group(
        &self,
        group_id: GroupId,
        new_name: &str,
        requester: &UserId,
    ) -> ChatResult<GroupChat> {
        let name = validate_name(new_name)?;
        let requester = requester.clone();
        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                if group.owner_id != requester {
                    return Err(ChatError::forbidden("only the owner can rename the group"));
                }
                db.rename_group(group_id, &name, now())?;
                info!(group = %group_id, name = %name, "Renamed group");
                Ok(db.get_group(group_id)?)
            })
            .await
    }

    /// Load a group `requester` is a member of.
    pub async fn get_group(&self, group_id: GroupId, requester: &UserId) -> ChatResult<GroupChat> {
        let requester = requester.clone();
        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                ensure_member(&group, &requester)?;
                Ok(group)
            })
            .await
    }

    /// Groups `user` belongs to, most recently active first, with unread
    /// counts.
    pub async fn list_groups(&self, user: &UserId) -> ChatResult<Vec<GroupSummary>> {
        let user = user.clone();
        self.store
            .call(move |db| {
                let groups = db.list_groups_for_user(&user)?;
                let mut out = Vec::with_capacity(groups.len());
                for group in groups {
                    let unread = db.count_group_unread(group.id, &user)?;
                    out.push(GroupSummary { group, unread });
                }
                Ok(out)
            })
            .await
    }
}

fn validate_name(name: &str) -> ChatResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::invalid("group name is empty"));
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(ChatError::invalid(format!(
            "group name exceeds {MAX_GROUP_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn ensure_member(group: &GroupChat, user: &UserId) -> ChatResult<()> {
    if group.is_member(user) {
        Ok(())
    } else {
        Err(ChatError::forbidden(format!(
            "user {user} is not a member of group {}",
            group.id
        )))
    }
}
