//! Shared query decoration
//!
//! Builds the discriminator plus foreign-key predicate pairs every
//! relation variant queries through, and the correlated subqueries behind
//! `has`/`doesnt_have`/`with_count` filtering. Self-referential relations
//! get a generated `sj_<n>` alias so correlated columns stay unambiguous.

use serde_json::Value;

use crate::model::{EntityDef, Record};
use crate::query::sql::format_value;
use crate::query::{Query, ScopeFn};
use crate::relations::link::{MorphLink, OwnerLink};

/// Predicate pair for one source row
pub(crate) fn constrain_to_parent(query: Query, link: &MorphLink, parent: &Record) -> Query {
    let identity = parent
        .present(&link.local_key)
        .cloned()
        .unwrap_or(Value::Null);
    query
        .where_eq(&link.type_key, link.type_value.as_str())
        .where_eq(&link.foreign_key, identity)
}

/// Batched predicate for a set of parent identities
pub(crate) fn constrain_to_parents(
    query: Query,
    link: &MorphLink,
    identities: Vec<Value>,
) -> Query {
    query
        .where_in(&link.foreign_key, identities)
        .where_eq(&link.type_key, link.type_value.as_str())
}

/// Correlated subquery against an outgoing relation's target.
///
/// The caller scope runs first and the correlation pair is appended last,
/// so scope predicates can never interleave with it. When source and
/// target share a table, the subquery side takes the outer query's next
/// self-join alias.
pub(crate) fn correlated_subquery(
    outer: &mut Query,
    source_table: &str,
    target_table: &str,
    link: &MorphLink,
    select: Vec<&str>,
    scope: Option<&ScopeFn>,
) -> Query {
    let (subject, mut subquery) = subquery_base(outer, source_table, target_table);
    subquery = subquery.select(select);
    if let Some(scope) = scope {
        subquery = scope(subquery);
    }
    subquery
        .where_eq(
            &format!("{}.{}", subject, link.type_key),
            link.type_value.as_str(),
        )
        .where_raw(&format!(
            "{}.{} = {}.{}",
            subject, link.foreign_key, source_table, link.local_key
        ))
}

/// Correlated subquery against one morph-to candidate.
///
/// Only meaningful with a single candidate; the discriminator match is
/// correlated against the source row's type column.
pub(crate) fn owner_subquery(
    outer: &mut Query,
    source_table: &str,
    link: &OwnerLink,
    target: &'static EntityDef,
    select: Vec<&str>,
    scope: Option<&ScopeFn>,
) -> Query {
    let token = link.token_for(target);
    let (subject, mut subquery) = subquery_base(outer, source_table, target.table);
    subquery = subquery.select(select);
    if let Some(scope) = scope {
        subquery = scope(subquery);
    }
    subquery
        .where_raw(&format!(
            "{}.{} = {}.{}",
            subject,
            link.owner_key_for(target),
            source_table,
            link.foreign_key
        ))
        .where_raw(&format!(
            "{}.{} = {}",
            source_table,
            link.type_key,
            format_value(&Value::String(token))
        ))
}

fn subquery_base(outer: &mut Query, source_table: &str, target_table: &str) -> (String, Query) {
    if source_table == target_table {
        let alias = outer.next_self_join_alias();
        (alias.clone(), Query::table(target_table).aliased(alias))
    } else {
        (target_table.to_string(), Query::table(target_table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityDef;
    use crate::relations::map::MorphMap;
    use serde_json::json;

    static VIDEOS: EntityDef = EntityDef::new("Video", "videos", "id");
    static TAGS: EntityDef = EntityDef::new("Tag", "tags", "id");

    fn tag_link() -> MorphLink {
        MorphLink::from_determiner(&VIDEOS, "taggable", &MorphMap::new())
    }

    #[test]
    fn parent_predicates_pair_type_and_key() {
        let mut parent = Record::new(&VIDEOS);
        parent.set("id", 7);

        let sql = constrain_to_parent(Query::for_entity(&TAGS), &tag_link(), &parent).to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM tags WHERE taggable_type = 'videos' AND taggable_id = 7"
        );
    }

    #[test]
    fn zero_identities_constrain_like_any_other() {
        let mut parent = Record::new(&VIDEOS);
        parent.set("id", 0);

        let sql = constrain_to_parent(Query::for_entity(&TAGS), &tag_link(), &parent).to_sql();
        assert!(sql.ends_with("taggable_id = 0"));
    }

    #[test]
    fn batch_predicates_put_the_key_list_first() {
        let sql = constrain_to_parents(
            Query::for_entity(&TAGS),
            &tag_link(),
            vec![json!(1), json!(2)],
        )
        .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM tags WHERE taggable_id IN (1, 2) AND taggable_type = 'videos'"
        );
    }

    #[test]
    fn correlation_lands_after_caller_scope() {
        let mut outer = Query::table("videos");
        let scope: ScopeFn = std::sync::Arc::new(|query: Query| query.where_eq("status", "live"));
        let sub = correlated_subquery(
            &mut outer,
            "videos",
            "tags",
            &tag_link(),
            vec!["*"],
            Some(&scope),
        );
        assert_eq!(
            sub.to_sql(),
            "SELECT * FROM tags WHERE status = 'live' \
             AND tags.taggable_type = 'videos' AND tags.taggable_id = videos.id"
        );
    }

    #[test]
    fn self_referential_targets_take_generated_aliases() {
        static COMMENTS: EntityDef = EntityDef::new("Comment", "comments", "id");
        let link = MorphLink::from_determiner(&COMMENTS, "commentable", &MorphMap::new());

        let mut outer = Query::for_entity(&COMMENTS);
        let first = correlated_subquery(
            &mut outer,
            "comments",
            "comments",
            &link,
            vec!["COUNT(*)"],
            None,
        );
        let second = correlated_subquery(
            &mut outer,
            "comments",
            "comments",
            &link,
            vec!["COUNT(*)"],
            None,
        );

        assert_eq!(
            first.to_sql(),
            "SELECT COUNT(*) FROM comments AS sj_0 \
             WHERE sj_0.commentable_type = 'comments' AND sj_0.commentable_id = comments.id"
        );
        assert!(second.to_sql().contains("comments AS sj_1"));
        assert!(second.to_sql().contains("sj_1.commentable_id = comments.id"));
    }

    #[test]
    fn owner_subqueries_correlate_both_columns() {
        static POSTS: EntityDef = EntityDef::new("Post", "posts", "id");
        static CANDIDATES: [&EntityDef; 1] = [&POSTS];
        static COMMENTS: EntityDef = EntityDef::new("Comment", "comments", "id");

        let link = OwnerLink::from_determiner(&CANDIDATES, "commentable", &MorphMap::new());
        let mut outer = Query::for_entity(&COMMENTS);
        let sub = owner_subquery(&mut outer, "comments", &link, &POSTS, vec!["*"], None);
        assert_eq!(
            sub.to_sql(),
            "SELECT * FROM posts WHERE posts.id = comments.commentable_id \
             AND comments.commentable_type = 'posts'"
        );
    }
}
