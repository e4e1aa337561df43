use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Enums stored as TEXT columns.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
}

text_enum!(Access, "access", { Public => "public", Private => "private" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
    Gif,
}

text_enum!(MediaType, "media type", { Image => "IMAGE", Video => "VIDEO", Gif => "GIF" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Admin,
    Moderator,
    Member,
}

text_enum!(MemberRole, "member role", {
    Admin => "ADMIN",
    Moderator => "MODERATOR",
    Member => "MEMBER",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Follow,
    Comment,
    Reply,
    Like,
    Star,
}

text_enum!(NotificationKind, "notification type", {
    Follow => "FOLLOW",
    Comment => "COMMENT",
    Reply => "REPLY",
    Like => "LIKE",
    Star => "STAR",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The public face of a user attached to posts, comments and members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub access: Access,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub post_id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCounts {
    pub likes: i64,
    pub comments: i64,
    pub bookmarks: i64,
}

/// A post as it appears in feeds: author, media and aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserSummary,
    pub media: Vec<Media>,
    #[serde(rename = "_count")]
    pub counts: PostCounts,
}

/// Single-post fetch, with the viewer-relative flags computed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub view: PostView,
    pub is_following_author: bool,
    pub is_bookmarked: bool,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostComment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: PostComment,
    pub author: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub category_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityMember {
    pub user: UserSummary,
    pub role: MemberRole,
    pub joined_at: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCounts {
    pub members: i64,
    pub posts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDetail {
    #[serde(flatten)]
    pub community: Community,
    pub category: Option<CommunityCategory>,
    pub creator: UserSummary,
    pub members: Vec<CommunityMember>,
    #[serde(rename = "_count")]
    pub counts: CommunityCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPost {
    pub id: String,
    pub community_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub author: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub user_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub owner: UserSummary,
    pub stars: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub actor_id: Option<String>,
    pub post_id: Option<String>,
    pub project_id: Option<String>,
    pub community_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_column_text() {
        assert_eq!("private".parse::<Access>().unwrap(), Access::Private);
        assert_eq!(MediaType::Gif.as_str(), "GIF");
        assert_eq!("MODERATOR".parse::<MemberRole>().unwrap(), MemberRole::Moderator);
    }

    #[test]
    fn unknown_enum_text_is_an_error() {
        let err = "friends".parse::<Access>().unwrap_err();
        assert_eq!(err.to_string(), "unknown access value: friends");
    }

    #[test]
    fn post_view_serializes_flat_and_camel_case() {
        let view = PostView {
            post: Post {
                id: "p1".into(),
                content: "hello".into(),
                user_id: "u1".into(),
                access: Access::Public,
                created_at: "2025-01-15T12:00:00.000Z".into(),
                updated_at: "2025-01-15T12:00:00.000Z".into(),
            },
            author: UserSummary {
                id: "u1".into(),
                name: "Ana".into(),
                image: None,
                country: None,
            },
            media: vec![Media {
                id: "m1".into(),
                post_id: "p1".into(),
                url: "https://cdn.example.com/a.png".into(),
                media_type: MediaType::Image,
            }],
            counts: PostCounts::default(),
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["access"], "public");
        assert_eq!(json["media"][0]["type"], "IMAGE");
        assert_eq!(json["_count"]["likes"], 0);
    }
}
