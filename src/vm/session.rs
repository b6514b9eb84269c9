//! 编辑会话：草稿状态、保存与保存后的选择重同步
//!
//! 存储的读写只发生在这一层；变更本身交给 [`MutationEngine`]，它只接收文本并返回文本。
//! 保存成功后记录待重同步的路径及所写文本的指纹；只有依据该文本完成的重建信号
//! 才会被 [`EditSession::on_nodes_regenerated`] 一次性消费。

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::config::EditorConfig;
use crate::model::caster::{cast, to_draft_text, ValueType};
use crate::model::data_core::{
    text_fingerprint, DocumentStore, EditError, NodeStore, Regenerated,
};
use crate::model::mutation::MutationEngine;
use crate::model::path::{path_to_display_string, Path};
use crate::model::projector::{normalize, project, Editability};
use crate::model::shadow_tree::Node;
use crate::vm::bridge::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Draft {
    #[default]
    Empty,
    /// 原始叶子的单个草稿
    Value(String),
    /// 对象节点：属性名 → 草稿
    Properties(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftState {
    pub editing: bool,
    pub draft: Draft,
    pub error: Option<String>,
}

fn initial_draft(node: &Node) -> Draft {
    let text_of = |row: &crate::model::shadow_tree::Row| {
        row.value.as_ref().map(to_draft_text).unwrap_or_default()
    };
    match project(node).editability() {
        Editability::PrimitiveLeaf => Draft::Value(text_of(&node.rows[0])),
        Editability::Object => Draft::Properties(
            node.rows
                .iter()
                .filter(|row| !row.kind.is_container())
                .filter_map(|row| Some((row.key.clone()?, text_of(row))))
                .collect(),
        ),
        Editability::None => Draft::Empty,
    }
}

pub struct EditSession<D, N> {
    documents: Rc<RefCell<D>>,
    graph: Rc<RefCell<N>>,
    engine: MutationEngine,
    state: DraftState,
    /// 进入编辑时的节点快照，保存时以它的行类型为准
    editing_node: Option<Node>,
    /// 待重同步的路径，以及保存时写入文本的指纹
    pending_resync: Option<(Path, u64)>,
    status: String,
}

impl<D: DocumentStore, N: NodeStore> EditSession<D, N> {
    pub fn new(documents: Rc<RefCell<D>>, graph: Rc<RefCell<N>>, config: &EditorConfig) -> Self {
        let mut session = Self {
            documents,
            graph,
            engine: MutationEngine::with_indent(config.indent),
            state: DraftState::default(),
            editing_node: None,
            pending_resync: None,
            status: STATUS_READY.to_string(),
        };
        session.reset_draft();
        session
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_editing(&self) -> bool {
        self.state.editing
    }

    pub fn pending_resync(&self) -> Option<&Path> {
        self.pending_resync.as_ref().map(|(path, _)| path)
    }

    /// 当前选中节点的展示文本
    pub fn display_text(&self) -> Option<String> {
        self.graph
            .borrow()
            .selected_node()
            .map(|node| normalize(&node.rows))
    }

    /// 当前选中节点的 JSONPath 展示形式
    pub fn display_path(&self) -> String {
        let graph = self.graph.borrow();
        path_to_display_string(graph.selected_node().map(|node| &node.path))
    }

    fn reset_draft(&mut self) {
        let selected = self.graph.borrow().selected_node().cloned();
        self.state = DraftState {
            editing: false,
            draft: selected.as_ref().map(initial_draft).unwrap_or_default(),
            error: None,
        };
    }

    /// 选择变化通知：非编辑状态下按新节点重新初始化草稿
    pub fn selection_changed(&mut self) {
        if !self.state.editing {
            self.reset_draft();
        }
    }

    pub fn start_edit(&mut self) -> Result<(), EditError> {
        if self.state.editing {
            return Ok(());
        }
        let node = self
            .graph
            .borrow()
            .selected_node()
            .cloned()
            .ok_or_else(|| EditError::State("未选中任何节点".into()))?;
        if project(&node).editability() == Editability::None {
            return Err(EditError::State(format!("节点不可编辑: {}", node.path)));
        }
        self.state = DraftState {
            editing: true,
            draft: initial_draft(&node),
            error: None,
        };
        tracing::info!("开始编辑: {}", node.path);
        self.editing_node = Some(node);
        self.status = STATUS_EDITING.to_string();
        Ok(())
    }

    /// 丢弃未保存的草稿；不触碰文档
    pub fn cancel_edit(&mut self) {
        if let Some(node) = self.editing_node.take() {
            tracing::info!("取消编辑: {}", node.path);
        }
        self.reset_draft();
        self.status = STATUS_CANCELLED.to_string();
    }

    /// 更新原始叶子的草稿，返回是否生效
    pub fn update_draft_value(&mut self, text: &str) -> bool {
        match (&mut self.state.draft, self.state.editing) {
            (Draft::Value(draft), true) => {
                *draft = text.to_string();
                true
            }
            _ => {
                tracing::warn!("忽略草稿更新：当前不是原始叶子编辑");
                false
            }
        }
    }

    /// 更新对象属性草稿；只接受可编辑的已有属性
    pub fn update_draft_property(&mut self, key: &str, text: &str) -> bool {
        match (&mut self.state.draft, self.state.editing) {
            (Draft::Properties(drafts), true) => match drafts.get_mut(key) {
                Some(draft) => {
                    *draft = text.to_string();
                    true
                }
                None => {
                    tracing::warn!("忽略未知属性草稿: {}", key);
                    false
                }
            },
            _ => {
                tracing::warn!("忽略属性草稿更新：当前不是对象编辑");
                false
            }
        }
    }

    fn build_new_document(&self) -> Result<(Path, String), EditError> {
        if !self.state.editing {
            return Err(EditError::State("当前未处于编辑状态".into()));
        }
        let node = self
            .editing_node
            .as_ref()
            .ok_or_else(|| EditError::State("编辑节点丢失".into()))?;
        let text = self.documents.borrow().document_text();

        let new_text = match (project(node).editability(), &self.state.draft) {
            (Editability::PrimitiveLeaf, Draft::Value(draft)) => {
                let value = cast(draft, node.rows[0].kind)
                    .map_err(|source| EditError::Cast { key: None, source })?;
                self.engine.apply_primitive_edit(&text, &node.path, value)?
            }
            (Editability::Object, Draft::Properties(drafts)) => {
                // 只提交改动过的属性，未改动的保持原样
                let original = match initial_draft(node) {
                    Draft::Properties(original) => original,
                    _ => BTreeMap::new(),
                };
                let edits: BTreeMap<String, String> = drafts
                    .iter()
                    .filter(|(k, v)| original.get(*k) != Some(*v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let row_types: HashMap<String, ValueType> = node
                    .rows
                    .iter()
                    .filter_map(|row| Some((row.key.clone()?, row.kind)))
                    .collect();
                self.engine
                    .apply_object_edit(&text, &node.path, &edits, &row_types)?
            }
            _ => return Err(EditError::State(format!("节点不可编辑: {}", node.path))),
        };
        Ok((node.path.clone(), new_text))
    }

    /// 保存草稿。失败时错误信息绑定到草稿状态，文档保持不变。
    pub fn save_edit(&mut self) -> Result<(), EditError> {
        match self.build_new_document() {
            Ok((path, new_text)) => {
                let fingerprint = text_fingerprint(&new_text);
                self.documents.borrow_mut().set_document_text(new_text);
                self.state = DraftState::default();
                self.editing_node = None;
                tracing::info!("保存成功: {}", path);
                self.pending_resync = Some((path, fingerprint));
                self.status = STATUS_SAVED.to_string();
                Ok(())
            }
            Err(e) => {
                let message = format!("{}{}", STATUS_ERROR_PREFIX, e);
                tracing::error!("保存失败: {}", e);
                self.state.error = Some(message.clone());
                self.status = message;
                Err(e)
            }
        }
    }

    /// 节点集合重建完成的信号：在新节点集合中按路径找回被编辑的节点。
    ///
    /// 找不到时清空选择，这不是错误。没有待重同步的路径时什么也不做；
    /// 信号若不是依据本次保存的文本重建的，保留待重同步路径等待下一次信号。
    pub fn on_nodes_regenerated(&mut self, signal: Regenerated) -> Option<Node> {
        let expected = self.pending_resync.as_ref().map(|(_, fingerprint)| *fingerprint)?;
        if signal.source != expected {
            tracing::debug!("忽略过期的重建信号 ({} 个节点)", signal.node_count);
            return None;
        }
        let (path, _) = self.pending_resync.take()?;
        let found = self.graph.borrow().find_by_path(&path).cloned();
        self.graph.borrow_mut().set_selected_node(found.clone());
        match &found {
            Some(_) => tracing::info!("重同步选中: {}", path),
            None => tracing::warn!("重同步未找到节点，选择已清空: {}", path),
        }
        self.selection_changed();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data_core::{MemoryDocumentStore, MemoryNodeStore};
    use crate::model::mutation::parse_document;
    use crate::model::shadow_tree::Row;
    use serde_json::json;

    struct Fixture {
        documents: Rc<RefCell<MemoryDocumentStore>>,
        graph: Rc<RefCell<MemoryNodeStore>>,
        session: EditSession<MemoryDocumentStore, MemoryNodeStore>,
    }

    /// 文档变更时自动重建节点集合
    fn setup(doc: &str) -> Fixture {
        let fx = setup_detached(doc);
        {
            let graph = fx.graph.clone();
            fx.documents.borrow_mut().subscribe(move |text| {
                graph.borrow_mut().regenerate(text).expect("重建节点集合失败");
            });
        }
        fx
    }

    /// 节点集合只在初始化时构建一次，之后由测试手动重建
    fn setup_detached(doc: &str) -> Fixture {
        let documents = Rc::new(RefCell::new(MemoryDocumentStore::new(doc)));
        let config = EditorConfig::default();
        let graph = Rc::new(RefCell::new(MemoryNodeStore::from_config(&config)));
        graph.borrow_mut().regenerate(doc).expect("初始文档应该可解析");
        let session = EditSession::new(documents.clone(), graph.clone(), &config);
        Fixture {
            documents,
            graph,
            session,
        }
    }

    fn select(fx: &mut Fixture, path: &Path) {
        assert!(fx.graph.borrow_mut().select_path(path), "应该能选中 {}", path);
        fx.session.selection_changed();
    }

    fn last_signal(fx: &Fixture) -> Regenerated {
        fx.graph.borrow().last_regenerated().expect("应该已有重建信号")
    }

    fn document(fx: &Fixture) -> serde_json::Value {
        parse_document(&fx.documents.borrow().document_text()).unwrap()
    }

    #[test]
    fn test_primitive_edit_and_resync() {
        let mut fx = setup(r#"{"a":1,"b":{"c":2},"list":[10,20]}"#);
        let path = Path::root().child("list").child(1usize);
        select(&mut fx, &path);
        assert_eq!(fx.session.state().draft, Draft::Value("20".into()));
        assert_eq!(fx.session.display_path(), "$[\"list\"][1]");
        assert_eq!(fx.session.display_text().as_deref(), Some("20"));

        fx.session.start_edit().unwrap();
        assert!(fx.session.update_draft_value("5"));
        fx.session.save_edit().unwrap();

        assert_eq!(document(&fx), json!({"a": 1, "b": {"c": 2}, "list": [10, 5]}));
        assert_eq!(fx.documents.borrow().revision(), 1);
        assert!(!fx.session.is_editing());
        assert_eq!(fx.session.status(), STATUS_SAVED);
        assert_eq!(fx.session.pending_resync(), Some(&path));

        let signal = last_signal(&fx);
        let node = fx.session.on_nodes_regenerated(signal).expect("应该找回被编辑节点");
        assert_eq!(node.path, path);
        assert_eq!(node.rows[0].value, Some(json!(5)));
        assert_eq!(fx.graph.borrow().selected_node(), Some(&node));
        assert_eq!(fx.session.state().draft, Draft::Value("5".into()));
        assert!(fx.session.on_nodes_regenerated(signal).is_none(), "重同步只执行一次");
    }

    #[test]
    fn test_cast_failure_leaves_document_unchanged() {
        let mut fx = setup(r#"{"a":"x"}"#);
        let node = Node::new(
            Path::root().child("a"),
            vec![Row {
                key: None,
                kind: ValueType::Number,
                value: Some(json!("x")),
                children: None,
            }],
        );
        fx.graph.borrow_mut().set_selected_node(Some(node));
        fx.session.selection_changed();

        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("abc");
        let err = fx.session.save_edit().unwrap_err();

        assert!(matches!(err, EditError::Cast { key: None, .. }));
        assert_eq!(fx.documents.borrow().document_text(), r#"{"a":"x"}"#);
        assert_eq!(fx.documents.borrow().revision(), 0);
        assert!(fx.session.is_editing(), "失败后仍处于编辑状态");
        let message = fx.session.state().error.clone().unwrap();
        assert!(message.starts_with(STATUS_ERROR_PREFIX));
        assert!(message.contains("abc"));
        assert!(fx.session.pending_resync().is_none());
    }

    #[test]
    fn test_object_edit_keeps_untouched_properties() {
        let mut fx = setup(r#"{"obj":{"k1":1,"k2":"  padded  ","k3":{"deep":true}}}"#);
        let path = Path::root().child("obj");
        select(&mut fx, &path);

        fx.session.start_edit().unwrap();
        assert!(fx.session.update_draft_property("k1", "9"));
        assert!(!fx.session.update_draft_property("k3", "flat"), "容器属性不可编辑");
        assert!(!fx.session.update_draft_property("ghost", "1"));
        fx.session.save_edit().unwrap();

        assert_eq!(
            document(&fx),
            json!({"obj": {"k1": 9, "k2": "  padded  ", "k3": {"deep": true}}})
        );
        let node = fx.session.on_nodes_regenerated(last_signal(&fx)).unwrap();
        assert_eq!(node.path, path);
    }

    #[test]
    fn test_object_edit_cast_error_names_property() {
        let mut fx = setup(r#"{"obj":{"flag":true,"n":2}}"#);
        select(&mut fx, &Path::root().child("obj"));
        fx.session.start_edit().unwrap();
        fx.session.update_draft_property("flag", "maybe");
        let err = fx.session.save_edit().unwrap_err();
        assert!(matches!(err, EditError::Cast { key: Some(ref k), .. } if k == "flag"));
        assert!(fx.session.state().error.as_deref().unwrap().contains("flag"));
    }

    #[test]
    fn test_cancel_discards_drafts() {
        let mut fx = setup(r#"["keep"]"#);
        let path = Path::root().child(0usize);
        select(&mut fx, &path);
        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("changed");
        fx.session.cancel_edit();

        assert!(!fx.session.is_editing());
        assert_eq!(fx.session.state().draft, Draft::Value("keep".into()));
        assert_eq!(fx.session.status(), STATUS_CANCELLED);
        assert_eq!(fx.documents.borrow().revision(), 0);
        assert!(fx.session.save_edit().is_err(), "取消后不能保存");
    }

    #[test]
    fn test_root_edit_replaces_document() {
        let mut fx = setup(r#""hello""#);
        select(&mut fx, &Path::root());
        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("  world ");
        fx.session.save_edit().unwrap();
        assert_eq!(fx.documents.borrow().document_text(), r#""world""#);
        assert!(fx.session.on_nodes_regenerated(last_signal(&fx)).is_some());
    }

    #[test]
    fn test_resync_miss_clears_selection() {
        let mut fx = setup(r#"{"a":1}"#);
        let node = Node::new(
            Path::root().child("a"),
            vec![Row::of(None, &json!(1))],
        );
        fx.graph.borrow_mut().set_selected_node(Some(node));
        fx.session.selection_changed();
        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("2");
        fx.session.save_edit().unwrap();
        assert_eq!(document(&fx), json!({"a": 2}));

        // 标量属性在新节点集合中不是独立节点
        assert!(fx.session.on_nodes_regenerated(last_signal(&fx)).is_none());
        assert!(fx.session.pending_resync().is_none(), "未命中也会消费待重同步路径");
        assert!(fx.graph.borrow().selected_node().is_none());
        assert_eq!(fx.session.state().draft, Draft::Empty);
        assert_eq!(fx.session.display_path(), "$");
    }

    #[test]
    fn test_stale_signal_keeps_resync_pending() {
        let mut fx = setup_detached(r#"{"list":[10,20]}"#);
        let path = Path::root().child("list").child(1usize);
        select(&mut fx, &path);
        let stale = last_signal(&fx);

        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("5");
        fx.session.save_edit().unwrap();

        // 节点集合尚未按新文本重建
        assert!(fx.session.on_nodes_regenerated(stale).is_none());
        assert_eq!(fx.session.pending_resync(), Some(&path), "过期信号不消费待重同步路径");
        let selected = fx.graph.borrow().selected_node().cloned().unwrap();
        assert_eq!(selected.rows[0].value, Some(json!(20)), "过期信号不改变选择");

        let text = fx.documents.borrow().document_text();
        let fresh = fx.graph.borrow_mut().regenerate(&text).unwrap();
        let node = fx.session.on_nodes_regenerated(fresh).expect("新信号应该找回节点");
        assert_eq!(node.rows[0].value, Some(json!(5)));
        assert!(fx.session.pending_resync().is_none());
    }

    #[test]
    fn test_start_edit_requires_editable_selection() {
        let mut fx = setup(r#"{"a":{"b":1}}"#);
        assert!(matches!(fx.session.start_edit(), Err(EditError::State(_))));

        select(&mut fx, &Path::root());
        assert!(matches!(fx.session.start_edit(), Err(EditError::State(_))));
        assert!(!fx.session.is_editing());
    }

    #[test]
    fn test_selection_change_while_editing_keeps_draft() {
        let mut fx = setup(r#"[1, 2]"#);
        select(&mut fx, &Path::root().child(0usize));
        fx.session.start_edit().unwrap();
        fx.session.update_draft_value("7");

        select(&mut fx, &Path::root().child(1usize));
        assert_eq!(fx.session.state().draft, Draft::Value("7".into()));

        fx.session.save_edit().unwrap();
        assert_eq!(document(&fx), json!([7, 2]), "保存的是进入编辑时的节点");
    }

    #[test]
    fn test_invalid_document_aborts_save() {
        let mut fx = setup_detached(r#"[1]"#);
        select(&mut fx, &Path::root().child(0usize));
        fx.session.start_edit().unwrap();
        fx.documents.borrow_mut().set_document_text("{broken".to_string());
        let revision = fx.documents.borrow().revision();

        let err = fx.session.save_edit().unwrap_err();
        assert!(matches!(err, EditError::InvalidDocument(_)));
        assert_eq!(fx.documents.borrow().revision(), revision, "失败时不写入");
    }

    #[test]
    fn test_update_ignored_when_not_editing() {
        let mut fx = setup(r#"[1]"#);
        select(&mut fx, &Path::root().child(0usize));
        assert!(!fx.session.update_draft_value("2"));
        assert_eq!(fx.session.state().draft, Draft::Value("1".into()));
    }

    #[test]
    fn test_custom_indent_on_save() {
        let documents = Rc::new(RefCell::new(MemoryDocumentStore::new(r#"{"x":[true]}"#)));
        let config = EditorConfig {
            indent: 4,
            ..EditorConfig::default()
        };
        let graph = Rc::new(RefCell::new(MemoryNodeStore::from_config(&config)));
        graph.borrow_mut().regenerate(r#"{"x":[true]}"#).unwrap();
        let mut session = EditSession::new(documents.clone(), graph.clone(), &config);
        graph.borrow_mut().select_path(&Path::root().child("x").child(0usize));
        session.selection_changed();
        session.start_edit().unwrap();
        session.update_draft_value("false");
        session.save_edit().unwrap();
        assert_eq!(
            documents.borrow().document_text(),
            "{\n    \"x\": [\n        false\n    ]\n}"
        );
    }
}
