//! Container tree: bound DOM subtrees arranged as an arena.
//!
//! A [`ContainerBlueprint`] describes the tree declaratively. Planting it
//! yields a [`ContainerTree`] whose nodes are addressed by [`ContainerId`];
//! every node records its parent index and how it is bound:
//!
//! - locator-bound nodes re-find their element on every refresh,
//! - handle-literal nodes (derived rows) keep the handle they were created
//!   with and are replaced wholesale when their parent re-derives rows.
//!
//! Refresh walks the arena top-down, so a child is always re-bound against
//! its parent's fresh handle.
use crate::table::ExtractionTable;
use harvest_common::{HarvestError, Locator, Result};
use harvest_drivers::wait::wait_for;
use harvest_drivers::{Browser, Scope, WaitPolicy};
use tracing::{debug, warn};

/// Structural test applied to every candidate row element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    Any,
    /// Keep elements with more than `count` descendants matching `locator`.
    MoreThan { locator: Locator, count: usize },
    /// Keep elements whose text is not blank.
    HasText,
}

impl RowFilter {
    async fn accepts<B: Browser>(&self, browser: &B, element: &B::Handle) -> Result<bool> {
        match self {
            RowFilter::Any => Ok(true),
            RowFilter::MoreThan { locator, count } => {
                let found = browser.find_all(Scope::Element(element), locator).await?;
                Ok(found.len() > *count)
            }
            RowFilter::HasText => Ok(!browser.text(element).await?.trim().is_empty()),
        }
    }
}

/// How to derive one row container per repeated element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowTemplate {
    pub common: Locator,
    pub fields: Vec<Locator>,
    pub filter: RowFilter,
}

impl RowTemplate {
    pub fn new(common: Locator, fields: Vec<Locator>) -> Self {
        Self {
            common,
            fields,
            filter: RowFilter::Any,
        }
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Declarative description of a container and its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBlueprint {
    pub name: String,
    pub locator: Locator,
    pub fields: Vec<Locator>,
    pub rows: Option<RowTemplate>,
    pub children: Vec<ContainerBlueprint>,
}

impl ContainerBlueprint {
    pub fn new(name: impl Into<String>, locator: Locator) -> Self {
        Self {
            name: name.into(),
            locator,
            fields: Vec::new(),
            rows: None,
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Locator) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_rows(mut self, rows: RowTemplate) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_child(mut self, child: ContainerBlueprint) -> Self {
        self.children.push(child);
        self
    }
}

/// Arena index plus the generation of the slot it was issued for. An id of a
/// pruned container never resolves again, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
enum Binding {
    Locator(Locator),
    Literal,
}

#[derive(Debug, Clone)]
struct Node<H> {
    name: String,
    parent: Option<ContainerId>,
    binding: Binding,
    handle: Option<H>,
    fields: Vec<Locator>,
    rows: Option<RowTemplate>,
    children: Vec<ContainerId>,
    derived: Vec<ContainerId>,
}

#[derive(Debug, Clone)]
struct Slot<H> {
    generation: u32,
    node: Option<Node<H>>,
}

/// Whether a failed bind is fatal or the end of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindMode {
    Initial,
    Refresh,
}

/// Arena of containers rooted at a single locator-bound node.
#[derive(Debug, Clone)]
pub struct ContainerTree<H> {
    slots: Vec<Slot<H>>,
    free: Vec<usize>,
    root: ContainerId,
    wait: WaitPolicy,
}

impl<H: Clone + Send + Sync + 'static> ContainerTree<H> {
    /// Build an unbound tree from `blueprint`; binds wait up to `wait.timeout`.
    pub fn plant(blueprint: &ContainerBlueprint, wait: WaitPolicy) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ContainerId {
                index: 0,
                generation: 0,
            },
            wait,
        };
        tree.root = tree.plant_node(blueprint, None);
        tree
    }

    fn plant_node(&mut self, blueprint: &ContainerBlueprint, parent: Option<ContainerId>) -> ContainerId {
        let id = self.insert(Node {
            name: blueprint.name.clone(),
            parent,
            binding: Binding::Locator(blueprint.locator.clone()),
            handle: None,
            fields: blueprint.fields.clone(),
            rows: blueprint.rows.clone(),
            children: Vec::new(),
            derived: Vec::new(),
        });
        for child in &blueprint.children {
            let child_id = self.plant_node(child, Some(id));
            if let Some(node) = self.slot_mut(id) {
                node.children.push(child_id);
            }
        }
        id
    }

    fn insert(&mut self, node: Node<H>) -> ContainerId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.node = Some(node);
                return ContainerId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ContainerId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn slot(&self, id: ContainerId) -> Option<&Node<H>> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn slot_mut(&mut self, id: ContainerId) -> Option<&mut Node<H>> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn node(&self, id: ContainerId) -> Result<&Node<H>> {
        self.slot(id)
            .ok_or_else(|| HarvestError::Config(format!("container {id:?} does not exist")))
    }

    fn node_mut(&mut self, id: ContainerId) -> Result<&mut Node<H>> {
        self.slot_mut(id)
            .ok_or_else(|| HarvestError::Config(format!("container {id:?} does not exist")))
    }

    pub fn root(&self) -> ContainerId {
        self.root
    }

    /// Number of live containers.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self, id: ContainerId) -> Option<&str> {
        self.slot(id).map(|node| node.name.as_str())
    }

    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.slot(id).and_then(|node| node.parent)
    }

    /// Sub-containers of `id`: declared children first, then derived rows.
    pub fn children(&self, id: ContainerId) -> Vec<ContainerId> {
        self.slot(id)
            .map(|node| node.children.iter().chain(&node.derived).copied().collect())
            .unwrap_or_default()
    }

    pub fn handle(&self, id: ContainerId) -> Option<&H> {
        self.slot(id).and_then(|node| node.handle.as_ref())
    }

    pub fn is_rebindable(&self, id: ContainerId) -> bool {
        matches!(
            self.slot(id).map(|node| &node.binding),
            Some(Binding::Locator(_))
        )
    }

    /// Bind container `id` against `scope`, waiting for its locator.
    pub async fn bind<B>(&mut self, browser: &B, id: ContainerId, scope: Scope<'_, H>) -> Result<()>
    where
        B: Browser<Handle = H>,
    {
        let node = self.node(id)?;
        let locator = match &node.binding {
            Binding::Locator(locator) => locator.clone(),
            Binding::Literal => {
                return Err(HarvestError::Config(format!(
                    "container '{}' is bound to a fixed handle and cannot be re-bound",
                    node.name
                )))
            }
        };
        let handle = wait_for(browser, scope, &locator, self.wait).await?;
        debug!(target: "engine.container", container = %node.name, %locator, "bound");
        self.node_mut(id)?.handle = Some(handle);
        Ok(())
    }

    /// Add a handle-literal child under `parent`.
    pub fn attach(
        &mut self,
        parent: ContainerId,
        name: impl Into<String>,
        handle: H,
        fields: Vec<Locator>,
    ) -> Result<ContainerId> {
        self.node(parent)?;
        let id = self.insert(Node {
            name: name.into(),
            parent: Some(parent),
            binding: Binding::Literal,
            handle: Some(handle),
            fields,
            rows: None,
            children: Vec::new(),
            derived: Vec::new(),
        });
        self.node_mut(parent)?.derived.push(id);
        Ok(id)
    }

    /// Replace the rows of `id` with one literal child per element matching
    /// `template.common` that passes `template.filter`.
    ///
    /// Returns the number of rows derived.
    pub async fn derive_children<B>(
        &mut self,
        browser: &B,
        id: ContainerId,
        template: &RowTemplate,
    ) -> Result<usize>
    where
        B: Browser<Handle = H>,
    {
        let node = self.node(id)?;
        let scope = node.handle.clone().ok_or_else(|| {
            HarvestError::Stale(format!("container '{}' is not bound", node.name))
        })?;
        let parent_name = node.name.clone();

        let candidates = browser.find_all(Scope::Element(&scope), &template.common).await?;
        let mut accepted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match template.filter.accepts(browser, &candidate).await {
                Ok(true) => accepted.push(candidate),
                Ok(false) => {}
                Err(err) if err.is_recoverable() => {
                    debug!(target: "engine.container", container = %parent_name, error = %err, "row candidate rejected");
                }
                Err(err) => return Err(err),
            }
        }

        let previous = std::mem::take(&mut self.node_mut(id)?.derived);
        for old in previous {
            self.prune(old);
        }
        let count = accepted.len();
        for (index, handle) in accepted.into_iter().enumerate() {
            let name = format!("{parent_name}: row {}", index + 1);
            self.attach(id, name, handle, template.fields.clone())?;
        }
        debug!(target: "engine.container", container = %parent_name, rows = count, "rows derived");
        Ok(count)
    }

    fn prune(&mut self, id: ContainerId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                stack.extend(node.children);
                stack.extend(node.derived);
                self.free.push(current.index);
            }
        }
    }

    /// Bind the whole tree after the first navigation. A missing element is
    /// reported as `NotFound`.
    pub async fn bind_tree<B>(&mut self, browser: &B) -> Result<()>
    where
        B: Browser<Handle = H>,
    {
        self.rebind_from_root(browser, BindMode::Initial).await
    }

    /// Re-bind every locator-bound container top-down and re-derive rows.
    ///
    /// A failed bind is reported as [`HarvestError::StaleSubtree`]: the page
    /// no longer carries the structure, which callers read as end of data.
    pub async fn refresh<B>(&mut self, browser: &B) -> Result<()>
    where
        B: Browser<Handle = H>,
    {
        self.rebind_from_root(browser, BindMode::Refresh).await
    }

    async fn rebind_from_root<B>(&mut self, browser: &B, mode: BindMode) -> Result<()>
    where
        B: Browser<Handle = H>,
    {
        let mut stack: Vec<(ContainerId, Option<H>)> = vec![(self.root, None)];
        while let Some((id, scope_handle)) = stack.pop() {
            let scope = match &scope_handle {
                Some(handle) => Scope::Element(handle),
                None => Scope::Document,
            };
            if self.is_rebindable(id) {
                if let Err(err) = self.bind(browser, id, scope).await {
                    return Err(self.bind_failure(id, err, mode));
                }
            }

            let rows = self.node(id)?.rows.clone();
            if let Some(template) = rows {
                if let Err(err) = self.derive_children(browser, id, &template).await {
                    return Err(self.bind_failure(id, err, mode));
                }
            }

            let node = self.node(id)?;
            let own = node.handle.clone();
            for child in node.children.iter().chain(&node.derived).rev() {
                stack.push((*child, own.clone()));
            }
        }
        Ok(())
    }

    fn bind_failure(&self, id: ContainerId, err: HarvestError, mode: BindMode) -> HarvestError {
        let container = self.name(id).unwrap_or("?").to_string();
        match mode {
            BindMode::Refresh if err.is_recoverable() => {
                warn!(target: "engine.container", %container, error = %err, "subtree went stale");
                HarvestError::StaleSubtree {
                    container,
                    reason: err.to_string(),
                }
            }
            _ => err,
        }
    }

    /// Append one cell per field locator to `table`, pre-order over the tree,
    /// then pad the table so every column has the same length.
    ///
    /// A field that matches nothing, or whose lookup fails recoverably,
    /// contributes an empty placeholder so rows stay aligned. With several
    /// matches the first one wins.
    pub async fn extract<B>(&self, browser: &B, table: &mut ExtractionTable) -> Result<()>
    where
        B: Browser<Handle = H>,
    {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            for field in &node.fields {
                let value = match &node.handle {
                    Some(handle) => self.field_value(browser, &node.name, handle, field).await?,
                    None => {
                        warn!(target: "engine.container", container = %node.name, "extracting from an unbound container");
                        String::new()
                    }
                };
                table.push(field.field_name(), value);
            }
            stack.extend(node.children.iter().chain(&node.derived).rev());
        }
        table.level();
        Ok(())
    }

    async fn field_value<B>(&self, browser: &B, container: &str, handle: &H, field: &Locator) -> Result<String>
    where
        B: Browser<Handle = H>,
    {
        let found = match browser.find_all(Scope::Element(handle), field).await {
            Ok(found) => found,
            Err(err) if err.is_recoverable() => {
                debug!(target: "engine.container", %container, %field, error = %err, "field lookup failed");
                return Ok(String::new());
            }
            Err(err) => return Err(err),
        };
        let Some(first) = found.first() else {
            return Ok(String::new());
        };
        match browser.text(first).await {
            Ok(text) => Ok(text),
            Err(err) if err.is_recoverable() => {
                debug!(target: "engine.container", %container, %field, error = %err, "field text unreadable");
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }
}
