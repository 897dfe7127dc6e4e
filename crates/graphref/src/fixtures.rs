//! Object graphs shared by the unit tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use proptest::prelude::*;
use proptest::sample::Index;

use crate::codec::{
    decode_field, decode_reference_seq, encode_field, encode_reference_seq, WireReader, WireWriter,
};
use crate::error::{DecodeError, EncodeError};
use crate::model::{ObjectId, Referenceable, VariantRegistry};
use crate::session::SessionContext;

type Slot = RwLock<Option<Arc<ProductComponent>>>;

/// A leaf or a pair of child components. Children sit behind locks so tests
/// can close cycles after construction.
pub enum ProductComponent {
    Simple { id: ObjectId, value: String },
    Aggregate { id: ObjectId, element1: Slot, element2: Slot },
}

impl ProductComponent {
    pub fn simple(id: &str, value: &str) -> Arc<Self> {
        Arc::new(ProductComponent::Simple {
            id: ObjectId::new(id),
            value: value.to_string(),
        })
    }

    pub fn aggregate(
        id: &str,
        element1: Option<Arc<Self>>,
        element2: Option<Arc<Self>>,
    ) -> Arc<Self> {
        Arc::new(ProductComponent::Aggregate {
            id: ObjectId::new(id),
            element1: RwLock::new(element1),
            element2: RwLock::new(element2),
        })
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ProductComponent::Simple { value, .. } => Some(value),
            ProductComponent::Aggregate { .. } => None,
        }
    }

    pub fn element1(&self) -> Option<Arc<Self>> {
        self.slot(|e1, _| e1)
            .and_then(|slot| slot.read().unwrap().clone())
    }

    pub fn element2(&self) -> Option<Arc<Self>> {
        self.slot(|_, e2| e2)
            .and_then(|slot| slot.read().unwrap().clone())
    }

    pub fn set_element2(&self, value: Option<Arc<Self>>) {
        if let Some(slot) = self.slot(|_, e2| e2) {
            *slot.write().unwrap() = value;
        }
    }

    fn slot<'a>(&'a self, pick: impl FnOnce(&'a Slot, &'a Slot) -> &'a Slot) -> Option<&'a Slot> {
        match self {
            ProductComponent::Aggregate {
                element1, element2, ..
            } => Some(pick(element1, element2)),
            ProductComponent::Simple { .. } => None,
        }
    }
}

impl fmt::Debug for ProductComponent {
    // Children are left out: graphs under test may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductComponent::Simple { id, value } => write!(f, "Simple({id}, {value:?})"),
            ProductComponent::Aggregate { id, .. } => write!(f, "Aggregate({id})"),
        }
    }
}

impl Referenceable for ProductComponent {
    fn object_id(&self) -> &ObjectId {
        match self {
            ProductComponent::Simple { id, .. } | ProductComponent::Aggregate { id, .. } => id,
        }
    }

    fn type_tag(&self) -> &'static str {
        match self {
            ProductComponent::Simple { .. } => "simple",
            ProductComponent::Aggregate { .. } => "aggregate",
        }
    }

    fn encode_fields(
        &self,
        writer: &mut dyn WireWriter,
        session: &mut SessionContext,
    ) -> Result<(), EncodeError> {
        match self {
            ProductComponent::Simple { value, .. } => {
                writer.field("value")?;
                writer.write_str(value)
            }
            ProductComponent::Aggregate { .. } => {
                encode_field(writer, session, "element1", self.element1().as_deref())?;
                encode_field(writer, session, "element2", self.element2().as_deref())
            }
        }
    }

    fn registry() -> &'static VariantRegistry<Self> {
        &COMPONENTS
    }
}

fn decode_simple(
    id: ObjectId,
    reader: &mut dyn WireReader,
    _session: &mut SessionContext,
) -> Result<ProductComponent, DecodeError> {
    reader.field("value")?;
    let value = reader.read_str()?;
    Ok(ProductComponent::Simple { id, value })
}

fn decode_aggregate(
    id: ObjectId,
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
) -> Result<ProductComponent, DecodeError> {
    let element1 = decode_field(reader, session, "element1")?;
    let element2 = decode_field(reader, session, "element2")?;
    Ok(ProductComponent::Aggregate {
        id,
        element1: RwLock::new(element1),
        element2: RwLock::new(element2),
    })
}

/// A record of another family holding primitives and a sequence of
/// components.
#[derive(Debug)]
pub struct Catalog {
    pub id: ObjectId,
    pub title: String,
    pub rating: f64,
    pub count: i64,
    pub featured: bool,
    pub components: Vec<Option<Arc<ProductComponent>>>,
}

impl Catalog {
    pub fn new(id: &str, title: &str, rating: f64, count: i64, featured: bool) -> Self {
        Self {
            id: ObjectId::new(id),
            title: title.to_string(),
            rating,
            count,
            featured,
            components: Vec::new(),
        }
    }

    pub fn with_components(mut self, components: Vec<Option<Arc<ProductComponent>>>) -> Self {
        self.components = components;
        self
    }
}

impl Referenceable for Catalog {
    fn object_id(&self) -> &ObjectId {
        &self.id
    }

    fn type_tag(&self) -> &'static str {
        "catalog"
    }

    fn encode_fields(
        &self,
        writer: &mut dyn WireWriter,
        session: &mut SessionContext,
    ) -> Result<(), EncodeError> {
        writer.field("title")?;
        writer.write_str(&self.title)?;
        writer.field("rating")?;
        writer.write_f64(self.rating)?;
        writer.field("count")?;
        writer.write_i64(self.count)?;
        writer.field("featured")?;
        writer.write_bool(self.featured)?;
        encode_reference_seq(writer, session, "components", &self.components)
    }

    fn registry() -> &'static VariantRegistry<Self> {
        &CATALOGS
    }
}

fn decode_catalog(
    id: ObjectId,
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
) -> Result<Catalog, DecodeError> {
    reader.field("title")?;
    let title = reader.read_str()?;
    reader.field("rating")?;
    let rating = reader.read_f64()?;
    reader.field("count")?;
    let count = reader.read_i64()?;
    reader.field("featured")?;
    let featured = reader.read_bool()?;
    let components = decode_reference_seq(reader, session, "components")?;
    Ok(Catalog {
        id,
        title,
        rating,
        count,
        featured,
        components,
    })
}

/// A type whose registry knows none of its variants.
#[derive(Debug)]
pub struct Orphan {
    id: ObjectId,
}

impl Orphan {
    pub fn new(id: &str) -> Self {
        Self { id: ObjectId::new(id) }
    }
}

impl Referenceable for Orphan {
    fn object_id(&self) -> &ObjectId {
        &self.id
    }

    fn type_tag(&self) -> &'static str {
        "orphan"
    }

    fn encode_fields(&self, _: &mut dyn WireWriter, _: &mut SessionContext) -> Result<(), EncodeError> {
        Ok(())
    }

    fn registry() -> &'static VariantRegistry<Self> {
        &ORPHANS
    }
}

lazy_static! {
    static ref COMPONENTS: VariantRegistry<ProductComponent> = {
        let mut registry = VariantRegistry::new("ProductComponent");
        registry.register("simple", decode_simple);
        registry.register("aggregate", decode_aggregate);
        registry
    };
    static ref CATALOGS: VariantRegistry<Catalog> = {
        let mut registry = VariantRegistry::new("Catalog");
        registry.register("catalog", decode_catalog);
        registry
    };
    static ref ORPHANS: VariantRegistry<Orphan> = VariantRegistry::new("Orphan");
}

/// `top = (a2, a3)`, `a2 = (a1, s2)`, `a1 = (s1, null)`, `a3 = (s2, null)`.
pub struct Scenario {
    pub s1: Arc<ProductComponent>,
    pub s2: Arc<ProductComponent>,
    pub a1: Arc<ProductComponent>,
    pub a2: Arc<ProductComponent>,
    pub a3: Arc<ProductComponent>,
    pub top: Arc<ProductComponent>,
}

pub fn scenario() -> Scenario {
    let s1 = ProductComponent::simple("#s1", "A");
    let s2 = ProductComponent::simple("#s2", "B");
    let a1 = ProductComponent::aggregate("#a1", Some(Arc::clone(&s1)), None);
    let a2 = ProductComponent::aggregate("#a2", Some(Arc::clone(&a1)), Some(Arc::clone(&s2)));
    let a3 = ProductComponent::aggregate("#a3", Some(Arc::clone(&s2)), None);
    let top = ProductComponent::aggregate("#top", Some(Arc::clone(&a2)), Some(Arc::clone(&a3)));
    Scenario {
        s1,
        s2,
        a1,
        a2,
        a3,
        top,
    }
}

/// One node of a random DAG: a leaf, or an aggregate whose children are
/// chosen among the nodes built before it.
pub type NodeSpec = (bool, Option<Index>, Option<Index>);

pub fn arb_dag() -> impl Strategy<Value = Vec<NodeSpec>> {
    prop::collection::vec(
        (any::<bool>(), any::<Option<Index>>(), any::<Option<Index>>()),
        1..40,
    )
}

/// Builds the nodes of a random DAG; the last node is the root.
pub fn build_dag(shape: &[NodeSpec]) -> Vec<Arc<ProductComponent>> {
    let mut nodes: Vec<Arc<ProductComponent>> = Vec::with_capacity(shape.len());
    for (i, (leaf, e1, e2)) in shape.iter().enumerate() {
        let id = format!("#n{i}");
        let node = if i == 0 || *leaf {
            ProductComponent::simple(&id, &format!("v{i}"))
        } else {
            let pick = |idx: &Option<Index>| idx.as_ref().map(|idx| Arc::clone(&nodes[idx.index(i)]));
            ProductComponent::aggregate(&id, pick(e1), pick(e2))
        };
        nodes.push(node);
    }
    nodes
}

/// Asserts `actual` has the same shape, values and sharing as `expected`.
/// Both graphs must be acyclic.
pub fn assert_same_graph(expected: &Arc<ProductComponent>, actual: &Arc<ProductComponent>) {
    let mut seen = HashMap::new();
    compare(expected, actual, &mut seen);
}

fn compare(
    expected: &Arc<ProductComponent>,
    actual: &Arc<ProductComponent>,
    seen: &mut HashMap<*const ProductComponent, *const ProductComponent>,
) {
    let (e, a) = (Arc::as_ptr(expected), Arc::as_ptr(actual));
    if let Some(&mapped) = seen.get(&e) {
        assert_eq!(mapped, a, "sharing of {} not preserved", expected.object_id());
        return;
    }
    assert!(
        !seen.values().any(|&other| other == a),
        "{} decoded onto an instance of another object",
        expected.object_id()
    );
    seen.insert(e, a);

    assert_eq!(expected.object_id(), actual.object_id());
    assert_eq!(expected.type_tag(), actual.type_tag());
    assert_eq!(expected.value(), actual.value());

    let children = [
        (expected.element1(), actual.element1()),
        (expected.element2(), actual.element2()),
    ];
    for pair in children {
        match pair {
            (None, None) => {}
            (Some(x), Some(y)) => compare(&x, &y, seen),
            _ => panic!("child presence differs under {}", expected.object_id()),
        }
    }
}

/// Routes codec logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
