//! Name and comment heuristics over introspected columns
//!
//! Form kinds come from an ordered rule table: the first rule whose cues
//! match wins, so a comment that mentions both "status" and "type" becomes a
//! switch, never a radio group. ASCII cues match whole words of the comment
//! (a multi-word cue matches a run of words); cues in other scripts, which
//! are not space-delimited, match as substrings. Column names match by whole
//! snake_case word.

use crate::naming;
use crate::schema::{ColumnDescriptor, FormKind, QueryOp, TableDescriptor, TypeCategory};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One comment/name cue rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormRule {
    pub form: FormKind,
    pub cues: Vec<String>,
}

impl FormRule {
    fn new(form: FormKind, cues: &[&str]) -> Self {
        Self {
            form,
            cues: cues.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Cue lists and denylists used by [`Classifier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassifierRules {
    /// Ordered; first match wins
    pub form_rules: Vec<FormRule>,
    /// Temporal cues; a matching column becomes a date input
    pub temporal_cues: Vec<String>,
    /// Start/end cues that promote a temporal match to date-time
    pub boundary_cues: Vec<String>,
    /// Rules that follow the temporal rule, still before type fallbacks
    pub late_form_rules: Vec<FormRule>,
    /// Declared lengths above this become multi-line inputs
    pub long_text_threshold: u32,
    /// Columns hidden from list views
    pub list_denylist: Vec<String>,
    /// Columns that default to query conditions
    pub query_fields: Vec<String>,
    pub parent_cues: Cues,
    pub level_cues: Cues,
    pub path_cues: Cues,
}

/// Name and comment cues for one tree-shape signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Cues {
    /// Exact column names
    pub names: Vec<String>,
    /// Comment cues, matched like form-rule cues
    pub comments: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            form_rules: vec![
                FormRule::new(
                    FormKind::Switch,
                    &["status", "enable", "enabled", "disable", "disabled", "whether", "状态", "是否", "启用", "禁用"],
                ),
                FormRule::new(FormKind::Radio, &["gender", "sex", "type", "性别", "类型"]),
                FormRule::new(FormKind::Checkbox, &["hobby", "hobbies", "tag", "tags", "爱好", "标签"]),
                FormRule::new(
                    FormKind::Select,
                    &["role", "department", "dept", "category", "角色", "部门", "分类"],
                ),
                FormRule::new(
                    FormKind::Upload,
                    &["image", "avatar", "cover", "photo", "picture", "图片", "头像", "封面"],
                ),
            ],
            temporal_cues: strings(&["time", "date", "时间", "日期"]),
            boundary_cues: strings(&["start", "end", "begin", "开始", "结束"]),
            late_form_rules: vec![FormRule::new(
                FormKind::Textarea,
                &["content", "description", "detail", "details", "intro", "introduction", "内容", "描述", "详情", "简介"],
            )],
            long_text_threshold: 200,
            list_denylist: strings(&["password", "password_hash", "salt", "token", "deleted_at"]),
            query_fields: strings(&["name", "username", "code", "status", "type", "email", "phone", "mobile"]),
            parent_cues: Cues {
                names: strings(&["parent_id", "pid"]),
                comments: strings(&["parent id", "父 id", "父id"]),
            },
            level_cues: Cues {
                names: strings(&["level", "depth"]),
                comments: strings(&["层级", "关系树等级", "tree level"]),
            },
            path_cues: Cues {
                names: strings(&["path", "tree_path"]),
                comments: strings(&["路径", "关系树", "tree path"]),
            },
        }
    }
}

/// Lower-cased comment plus snake_case name words of one column
struct Subject {
    comment: String,
    comment_words: Vec<String>,
    words: Vec<String>,
}

impl Subject {
    fn of(column: &ColumnDescriptor) -> Self {
        let comment = column.comment.to_lowercase();
        Self {
            comment_words: ascii_words(&comment),
            comment,
            words: naming::words(&column.name)
                .into_iter()
                .map(|w| w.to_ascii_lowercase())
                .collect(),
        }
    }

    fn mentions(&self, cue: &str) -> bool {
        let cue = cue.trim().to_lowercase();
        if cue.is_empty() {
            return false;
        }
        if !cue.is_ascii() {
            return self.comment.contains(&cue);
        }
        let cue_words = ascii_words(&cue);
        !cue_words.is_empty()
            && self
                .comment_words
                .windows(cue_words.len())
                .any(|run| run == cue_words.as_slice())
    }

    fn matches_any(&self, cues: &[String]) -> bool {
        cues.iter().any(|cue| {
            self.mentions(cue) || self.words.iter().any(|w| w.eq_ignore_ascii_case(cue))
        })
    }
}

/// ASCII alphanumeric runs; everything else separates words.
fn ascii_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Applies [`ClassifierRules`] to a table
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Fill every column's derived flags and the table's tree shape.
    pub fn classify(&self, table: &mut TableDescriptor) {
        for column in &mut table.columns {
            column.form = self.form_kind(column);
            column.is_list = self.is_list_visible(column);
            column.is_query = self.is_query_field(column);
            column.query_op = QueryOp::Eq;
        }
        table.is_tree_shaped = self.is_tree_shaped(&table.columns);
        tracing::debug!(
            table = %table.name,
            tree = table.is_tree_shaped,
            "classified columns"
        );
    }

    /// Infer the UI input kind for one column.
    pub fn form_kind(&self, column: &ColumnDescriptor) -> FormKind {
        let subject = Subject::of(column);

        if let Some(rule) = self.rules.form_rules.iter().find(|r| subject.matches_any(&r.cues)) {
            return rule.form;
        }
        if subject.matches_any(&self.rules.temporal_cues) {
            if subject.matches_any(&self.rules.boundary_cues) {
                return FormKind::Datetime;
            }
            return FormKind::Date;
        }
        if let Some(rule) = self
            .rules
            .late_form_rules
            .iter()
            .find(|r| subject.matches_any(&r.cues))
        {
            return rule.form;
        }

        let declared = column.raw_type.to_ascii_lowercase();
        if declared.contains("text") {
            FormKind::Textarea
        } else if declared.contains("bool") || column.category == TypeCategory::Boolean {
            FormKind::Switch
        } else if declared.contains("date") || declared.contains("time") {
            FormKind::Datetime
        } else if column.length > self.rules.long_text_threshold {
            FormKind::Textarea
        } else {
            FormKind::Input
        }
    }

    /// Visible unless the name or comment hits the sensitive denylist.
    pub fn is_list_visible(&self, column: &ColumnDescriptor) -> bool {
        !name_or_comment_hits(column, &self.rules.list_denylist)
    }

    pub fn is_query_field(&self, column: &ColumnDescriptor) -> bool {
        name_or_comment_hits(column, &self.rules.query_fields)
    }

    /// Parent reference plus either a level or a materialized path.
    pub fn is_tree_shaped(&self, columns: &[ColumnDescriptor]) -> bool {
        let has = |cues: &Cues| columns.iter().any(|c| cue_hit(c, cues));
        has(&self.rules.parent_cues) && (has(&self.rules.level_cues) || has(&self.rules.path_cues))
    }
}

fn name_or_comment_hits(column: &ColumnDescriptor, list: &[String]) -> bool {
    let subject = Subject::of(column);
    list.iter().any(|item| column.name == *item || subject.mentions(item))
}

fn cue_hit(column: &ColumnDescriptor, cues: &Cues) -> bool {
    let name = column.name.to_lowercase();
    let subject = Subject::of(column);
    cues.names.iter().any(|n| name == *n) || cues.comments.iter().any(|c| subject.mentions(c))
}
