//! Descriptions of what should exist in the host tree.
//!
//! An [`Element`] is immutable once built and cheap to clone. Components return
//! a fresh element tree from every render; the reconciler compares it against
//! the tree recorded by the previous pass.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::applier::HostId;
use crate::component::{AnyClass, Component};
use crate::hash::{key_of, Key};

pub type RenderResult = anyhow::Result<Element>;

/// Render entry point of a function component.
pub type FunctionRender = fn(&Props) -> RenderResult;

/// Event delivered to a bound listener by the host adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: HostId,
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: HostId) -> Self {
        Self {
            name: name.into(),
            target,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Event handler stored in props. Two listeners are equal only when they are
/// the same allocation.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Clone)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Listener(Listener),
    Any(Rc<dyn Any>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            PropValue::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    /// Text form used by hosts that store attributes as strings.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Int(value) => Some(value.to_string()),
            PropValue::Float(value) => Some(value.to_string()),
            PropValue::Str(value) => Some(value.clone()),
            PropValue::Listener(_) | PropValue::Any(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Listener(a), PropValue::Listener(b)) => a == b,
            (PropValue::Any(a), PropValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::Listener(listener) => listener.fmt(f),
            PropValue::Any(value) => write!(f, "Any({:p})", Rc::as_ptr(value)),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<Listener> for PropValue {
    fn from(value: Listener) -> Self {
        PropValue::Listener(value)
    }
}

/// Named values handed to host elements and components. Insertion order is
/// preserved, which keeps host property writes deterministic.
#[derive(Clone, Default)]
pub struct Props {
    values: IndexMap<Cow<'static, str>, PropValue>,
    children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Stores an arbitrary shared value, compared by identity.
    pub fn with_any<T: 'static>(self, name: impl Into<Cow<'static, str>>, value: Rc<T>) -> Self {
        self.with(name, PropValue::Any(value))
    }

    pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropValue::as_float)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.get(name).and_then(PropValue::as_listener)
    }

    pub fn any<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.get(name)? {
            PropValue::Any(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(name, value)| (name.as_ref(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalized children passed to the element.
    pub fn children(&self) -> &[Element] {
        &self.children
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Static description of a class component type.
#[derive(Clone, Copy)]
pub struct ClassType {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) create: fn(&Props) -> Box<dyn AnyClass>,
}

#[derive(Clone, Copy)]
pub enum ComponentType {
    Function {
        name: &'static str,
        render: FunctionRender,
    },
    Class(ClassType),
}

impl ComponentType {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::Function { name, .. } => name,
            ComponentType::Class(class) => class.name,
        }
    }

    pub(crate) fn id(&self) -> ComponentId {
        match self {
            ComponentType::Function { name, render } => ComponentId::Function(*render as usize, *name),
            ComponentType::Class(class) => ComponentId::Class(class.type_id),
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ComponentId {
    /// Entry point address plus name. Identical bodies may be folded into one
    /// address by the linker, so the name keeps such components apart.
    Function(usize, &'static str),
    Class(TypeId),
}

#[derive(Clone, Debug)]
pub enum ElementKind {
    Host(Cow<'static, str>),
    Text(String),
    Component(ComponentType),
    Fragment,
}

/// Identity of an element kind. Two elements can only be matched for an
/// update when their kind ids are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum KindId {
    Host(Cow<'static, str>),
    Text,
    Fragment,
    Component(ComponentId),
}

impl From<&'static str> for ElementKind {
    fn from(tag: &'static str) -> Self {
        ElementKind::Host(Cow::Borrowed(tag))
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        ElementKind::Host(Cow::Owned(tag))
    }
}

impl From<ComponentType> for ElementKind {
    fn from(component: ComponentType) -> Self {
        ElementKind::Component(component)
    }
}

#[derive(Clone)]
struct ElementInner {
    kind: ElementKind,
    props: Props,
    key: Option<Key>,
}

#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    pub fn new(kind: impl Into<ElementKind>, props: Props) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                kind: kind.into(),
                props,
                key: None,
            }),
        }
    }

    pub fn host(tag: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ElementKind::Host(tag.into()), Props::new())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Text(text.into()), Props::new())
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        Self::new(ElementKind::Fragment, Props::new()).children(children)
    }

    /// An element that renders nothing.
    pub fn empty() -> Self {
        Self::new(ElementKind::Fragment, Props::new())
    }

    pub fn function(name: &'static str, render: FunctionRender) -> Self {
        Self::new(ComponentType::Function { name, render }, Props::new())
    }

    pub fn class<C: Component>() -> Self {
        Self::new(ComponentType::Class(ClassType::of::<C>()), Props::new())
    }

    pub fn kind(&self) -> &ElementKind {
        &self.inner.kind
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn key_digest(&self) -> Option<Key> {
        self.inner.key
    }

    pub fn component_name(&self) -> Option<&'static str> {
        match &self.inner.kind {
            ElementKind::Component(component) => Some(component.name()),
            _ => None,
        }
    }

    /// Whether both handles describe the very same allocation.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn kind_id(&self) -> KindId {
        match &self.inner.kind {
            ElementKind::Host(tag) => KindId::Host(tag.clone()),
            ElementKind::Text(_) => KindId::Text,
            ElementKind::Fragment => KindId::Fragment,
            ElementKind::Component(component) => KindId::Component(component.id()),
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut ElementInner)) -> Self {
        f(Rc::make_mut(&mut self.inner));
        self
    }

    /// Identifies this element among its siblings across renders.
    ///
    /// Only the 64-bit digest of `key` is kept (see [`key_of`]). Two distinct
    /// keys with the same digest count as duplicates: the first one matches
    /// and the other mounts fresh.
    pub fn key<K: std::hash::Hash + ?Sized>(self, key: &K) -> Self {
        let digest = key_of(key);
        self.edit(|inner| inner.key = Some(digest))
    }

    pub fn prop(self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
        self.edit(|inner| inner.props.insert(name, value))
    }

    pub fn props_with(self, props: Props) -> Self {
        self.edit(|inner| {
            let children = std::mem::take(&mut inner.props.children);
            inner.props = props;
            if inner.props.children.is_empty() {
                inner.props.children = children;
            }
        })
    }

    /// Binds `handler` to the `on<event>` prop.
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.prop(format!("on{event}"), Listener::new(handler))
    }

    pub fn child(self, child: impl Into<Child>) -> Self {
        let mut normalized = Vec::new();
        child.into().normalize_into(&mut normalized);
        self.edit(|inner| inner.props.children.extend(normalized))
    }

    pub fn children<I>(self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let normalized = normalize_children(children);
        self.edit(|inner| inner.props.children.extend(normalized))
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Element");
        debug.field("kind", &self.inner.kind);
        if let Some(key) = self.inner.key {
            debug.field("key", &key);
        }
        debug
            .field("props", &self.inner.props)
            .field("children", &self.inner.props.children)
            .finish()
    }
}

/// Anything that may appear in a children list before normalization.
pub enum Child {
    Element(Element),
    Text(String),
    List(Vec<Child>),
    Empty,
}

impl Child {
    fn normalize_into(self, out: &mut Vec<Element>) {
        match self {
            Child::Element(element) => out.push(element),
            Child::Text(text) => out.push(Element::text(text)),
            Child::List(items) => {
                let children = normalize_children(items);
                out.push(Element::new(ElementKind::Fragment, Props::new()).edit(|inner| {
                    inner.props.children = children;
                }));
            }
            Child::Empty => {}
        }
    }
}

/// Drops empty entries, turns strings and numbers into text elements and wraps
/// nested lists in a fragment occupying a single position.
pub fn normalize_children<I>(children: I) -> Vec<Element>
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    let mut out = Vec::new();
    for child in children {
        child.into().normalize_into(&mut out);
    }
    out
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&Element> for Child {
    fn from(element: &Element) -> Self {
        Child::Element(element.clone())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

macro_rules! numeric_child {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(value.to_string())
                }
            }
        )*
    };
}

numeric_child!(i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Child::Empty)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

/// Declarative-tree factory: `h("ul", props, items)`.
pub fn h<K, I>(kind: K, props: Props, children: I) -> Element
where
    K: Into<ElementKind>,
    I: IntoIterator,
    I::Item: Into<Child>,
{
    Element::new(kind, props).children(children)
}

impl ClassType {
    pub fn of<C: Component>() -> Self {
        Self {
            name: C::NAME,
            type_id: TypeId::of::<C>(),
            create: crate::component::create_class::<C>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_are_normalized() {
        let element = h(
            "div",
            Props::new(),
            vec![
                Child::from("hello"),
                Child::from(false),
                Child::from(None::<Element>),
                Child::from(42),
                Child::from(vec![Element::host("i"), Element::host("b")]),
            ],
        );
        let children = element.props().children();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[0].kind(), ElementKind::Text(text) if text == "hello"));
        assert!(matches!(children[1].kind(), ElementKind::Text(text) if text == "42"));
        assert!(matches!(children[2].kind(), ElementKind::Fragment));
        assert_eq!(children[2].props().children().len(), 2);
    }

    #[test]
    fn listeners_and_nan_compare_by_identity() {
        let listener = Listener::new(|_| {});
        assert_eq!(
            PropValue::Listener(listener.clone()),
            PropValue::Listener(listener)
        );
        assert_ne!(
            PropValue::Listener(Listener::new(|_| {})),
            PropValue::Listener(Listener::new(|_| {}))
        );
        assert_ne!(PropValue::Float(f64::NAN), PropValue::Float(f64::NAN));
        assert_eq!(PropValue::from("a"), PropValue::Str("a".into()));
    }

    #[test]
    fn builders_keep_the_original_untouched() {
        let base = Element::host("li").prop("class", "row");
        let keyed = base.clone().key("a");
        assert_eq!(base.key_digest(), None);
        assert_eq!(keyed.key_digest(), Some(key_of("a")));
        assert!(!base.ptr_eq(&keyed));
        assert_eq!(keyed.props().str("class"), Some("row"));
    }

    fn noop(_: &Props) -> RenderResult {
        Ok(Element::empty())
    }

    #[test]
    fn function_components_are_identified_by_entry_point() {
        let a = Element::function("Noop", noop);
        let b = Element::function("Noop", noop);
        assert_eq!(a.kind_id(), b.kind_id());
        assert_ne!(a.kind_id(), Element::host("div").kind_id());
        assert_ne!(a.kind_id(), Element::function("Renamed", noop).kind_id());
    }
}
