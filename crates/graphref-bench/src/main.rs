//! Benchmark for reference-aware serialization using a bill of materials.
//!
//! A product is built from assemblies that share standard parts (bolts,
//! washers, brackets) many times over. Plain tree serialization repeats every
//! shared part at each use; the reference codec sends each part once.
//!
//! Usage: `bench-bom [assemblies] [parts-per-assembly]`

use std::sync::Arc;
use std::time::Instant;

use graphref::codec::{
    decode_field, decode_reference_seq, encode_field, encode_reference_seq, WireReader, WireWriter,
};
use graphref::{
    DecodeError, EncodeError, ObjectId, Referenceable, SessionContext, VariantRegistry,
};
use lazy_static::lazy_static;
use serde::Serialize;

const NAMESPACE: &str = "bench-bom";

// =============================================================================
// DOMAIN
// =============================================================================

#[derive(Debug)]
enum Item {
    Part(Part),
    Assembly(Assembly),
}

#[derive(Debug)]
struct Part {
    id: ObjectId,
    name: String,
    unit_cost: f64,
    mass_grams: i64,
}

#[derive(Debug)]
struct Assembly {
    id: ObjectId,
    name: String,
    certified: bool,
    supplier: Option<Arc<Item>>,
    children: Vec<Option<Arc<Item>>>,
}

impl Referenceable for Item {
    fn object_id(&self) -> &ObjectId {
        match self {
            Item::Part(p) => &p.id,
            Item::Assembly(a) => &a.id,
        }
    }

    fn type_tag(&self) -> &'static str {
        match self {
            Item::Part(_) => "part",
            Item::Assembly(_) => "assembly",
        }
    }

    fn encode_fields(
        &self,
        writer: &mut dyn WireWriter,
        session: &mut SessionContext,
    ) -> Result<(), EncodeError> {
        match self {
            Item::Part(p) => {
                writer.field("name")?;
                writer.write_str(&p.name)?;
                writer.field("unit_cost")?;
                writer.write_f64(p.unit_cost)?;
                writer.field("mass_grams")?;
                writer.write_i64(p.mass_grams)
            }
            Item::Assembly(a) => {
                writer.field("name")?;
                writer.write_str(&a.name)?;
                writer.field("certified")?;
                writer.write_bool(a.certified)?;
                encode_field(writer, session, "supplier", a.supplier.as_deref())?;
                encode_reference_seq(writer, session, "children", &a.children)
            }
        }
    }

    fn registry() -> &'static VariantRegistry<Self> {
        &ITEMS
    }
}

fn decode_part(
    id: ObjectId,
    reader: &mut dyn WireReader,
    _session: &mut SessionContext,
) -> Result<Item, DecodeError> {
    reader.field("name")?;
    let name = reader.read_str()?;
    reader.field("unit_cost")?;
    let unit_cost = reader.read_f64()?;
    reader.field("mass_grams")?;
    let mass_grams = reader.read_i64()?;
    Ok(Item::Part(Part {
        id,
        name,
        unit_cost,
        mass_grams,
    }))
}

fn decode_assembly(
    id: ObjectId,
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
) -> Result<Item, DecodeError> {
    reader.field("name")?;
    let name = reader.read_str()?;
    reader.field("certified")?;
    let certified = reader.read_bool()?;
    let supplier = decode_field(reader, session, "supplier")?;
    let children = decode_reference_seq(reader, session, "children")?;
    Ok(Item::Assembly(Assembly {
        id,
        name,
        certified,
        supplier,
        children,
    }))
}

lazy_static! {
    static ref ITEMS: VariantRegistry<Item> = {
        let mut registry = VariantRegistry::new("Item");
        registry.register("part", decode_part);
        registry.register("assembly", decode_assembly);
        registry
    };
}

// =============================================================================
// EXPANDED TREE (plain serde, no references)
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ExpandedItem<'a> {
    Part {
        id: &'a str,
        name: &'a str,
        unit_cost: f64,
        mass_grams: i64,
    },
    Assembly {
        id: &'a str,
        name: &'a str,
        certified: bool,
        supplier: Option<Box<ExpandedItem<'a>>>,
        children: Vec<Option<ExpandedItem<'a>>>,
    },
}

fn expand(item: &Item) -> ExpandedItem<'_> {
    match item {
        Item::Part(p) => ExpandedItem::Part {
            id: p.id.as_str(),
            name: &p.name,
            unit_cost: p.unit_cost,
            mass_grams: p.mass_grams,
        },
        Item::Assembly(a) => ExpandedItem::Assembly {
            id: a.id.as_str(),
            name: &a.name,
            certified: a.certified,
            supplier: a.supplier.as_deref().map(|s| Box::new(expand(s))),
            children: a
                .children
                .iter()
                .map(|c| c.as_deref().map(expand))
                .collect(),
        },
    }
}

// =============================================================================
// GRAPH GENERATION
// =============================================================================

/// Deterministic xorshift, so runs are comparable.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn part(name: String, unit_cost: f64, mass_grams: i64) -> Arc<Item> {
    Arc::new(Item::Part(Part {
        id: ObjectId::derived(NAMESPACE, &name),
        name,
        unit_cost,
        mass_grams,
    }))
}

fn assembly(
    name: String,
    supplier: Option<Arc<Item>>,
    children: Vec<Option<Arc<Item>>>,
) -> Arc<Item> {
    Arc::new(Item::Assembly(Assembly {
        id: ObjectId::derived(NAMESPACE, &name),
        certified: name.len() % 2 == 0,
        name,
        supplier,
        children,
    }))
}

/// Builds a product of `assemblies` sub-assemblies, each made of
/// `parts_per_assembly` picks from a small catalog of standard parts.
fn build_product(assemblies: usize, parts_per_assembly: usize) -> Arc<Item> {
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);

    let standard: Vec<Arc<Item>> = (0..64)
        .map(|i| part(format!("standard-part-{i:03}"), 0.05 * (i + 1) as f64, 2 + i as i64))
        .collect();
    let suppliers: Vec<Arc<Item>> = (0..8)
        .map(|i| assembly(format!("supplier-kit-{i}"), None, vec![]))
        .collect();

    let mut subassemblies = Vec::with_capacity(assemblies);
    for i in 0..assemblies {
        let mut children: Vec<Option<Arc<Item>>> = (0..parts_per_assembly)
            .map(|_| Some(Arc::clone(&standard[rng.below(standard.len())])))
            .collect();
        // Assemblies also reuse earlier assemblies
        if i > 0 {
            children.push(Some(Arc::clone(&subassemblies[rng.below(i)])));
        }
        let supplier = Some(Arc::clone(&suppliers[rng.below(suppliers.len())]));
        subassemblies.push(assembly(format!("assembly-{i:05}"), supplier, children));
    }

    assembly(
        "product".to_string(),
        None,
        subassemblies.into_iter().map(Some).collect(),
    )
}

fn main() {
    let mut args = std::env::args().skip(1);
    let assemblies: usize = args
        .next()
        .map(|a| a.parse().expect("assemblies must be a number"))
        .unwrap_or(2_000);
    let parts_per_assembly: usize = args
        .next()
        .map(|a| a.parse().expect("parts-per-assembly must be a number"))
        .unwrap_or(24);

    let build_start = Instant::now();
    let product = build_product(assemblies, parts_per_assembly);
    println!(
        "Built {} assemblies x {} parts in {:?}",
        assemblies,
        parts_per_assembly,
        build_start.elapsed()
    );

    // Baseline: expanded tree through plain serde_json
    let expand_start = Instant::now();
    let expanded = serde_json::to_vec(&expand(&product)).expect("Failed to encode expanded tree");
    let expand_time = expand_start.elapsed();
    println!(
        "\nExpanded tree JSON: {} bytes in {:?}",
        expanded.len(),
        expand_time
    );

    // Reference JSON
    let json_start = Instant::now();
    let mut sender = SessionContext::new();
    let json = graphref::encode_json_string(Some(&*product), &mut sender)
        .expect("Failed to encode JSON");
    let json_time = json_start.elapsed();
    println!("\nReference JSON: {} bytes in {:?}", json.len(), json_time);
    println!(
        "  Size vs expanded: {:.1}x smaller",
        expanded.len() as f64 / json.len() as f64
    );
    let distinct = sender.encoded_len();
    println!("  {} distinct objects", distinct);

    let report = graphref::validate_json_wire(
        &serde_json::from_str(&json).expect("Failed to parse reference JSON"),
    )
    .expect("Wire audit failed");
    println!(
        "  {} full objects, {} identity references",
        report.full_objects(),
        report.identity_references()
    );

    // Binary
    let binary_start = Instant::now();
    let binary = graphref::encode_binary(Some(&*product), &mut SessionContext::new())
        .expect("Failed to encode binary");
    let binary_time = binary_start.elapsed();
    println!("\nBinary: {} bytes in {:?}", binary.len(), binary_time);
    println!(
        "  Throughput: {:.2} MB/s",
        (binary.len() as f64 / 1_000_000.0) / binary_time.as_secs_f64()
    );

    // Binary, compressed
    let compress_start = Instant::now();
    let compressed =
        graphref::encode_binary_compressed(Some(&*product), &mut SessionContext::new(), 3)
            .expect("Failed to compress");
    let compress_time = compress_start.elapsed();
    println!(
        "\nCompressed (level 3): {} bytes in {:?}",
        compressed.len(),
        compress_time
    );
    println!(
        "  Compression ratio: {:.1}x",
        binary.len() as f64 / compressed.len() as f64
    );

    // Decoding
    const DECODE_ITERS: u32 = 10;

    let decode_start = Instant::now();
    for _ in 0..DECODE_ITERS {
        let mut receiver = SessionContext::new();
        let decoded = graphref::decode_json_str::<Item>(&json, &mut receiver)
            .expect("Failed to decode JSON");
        assert!(decoded.is_some());
        assert_eq!(receiver.decoded_len(), distinct);
    }
    let decode_json_time = decode_start.elapsed() / DECODE_ITERS;
    println!(
        "\nDecode (reference JSON): {:?} (avg of {} iterations)",
        decode_json_time, DECODE_ITERS
    );

    let decode_start = Instant::now();
    for _ in 0..DECODE_ITERS {
        let mut receiver = SessionContext::new();
        let decoded = graphref::decode_binary::<Item>(&binary, &mut receiver)
            .expect("Failed to decode binary");
        assert!(decoded.is_some());
    }
    let decode_binary_time = decode_start.elapsed() / DECODE_ITERS;
    println!(
        "\nDecode (binary): {:?} (avg of {} iterations)",
        decode_binary_time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (binary.len() as f64 / 1_000_000.0) / decode_binary_time.as_secs_f64()
    );

    let decode_start = Instant::now();
    for _ in 0..DECODE_ITERS {
        let decoded = graphref::decode_binary::<Item>(&compressed, &mut SessionContext::new())
            .expect("Failed to decode compressed");
        assert!(decoded.is_some());
    }
    let decode_compressed_time = decode_start.elapsed() / DECODE_ITERS;
    println!(
        "\nDecode (compressed): {:?} (avg of {} iterations)",
        decode_compressed_time, DECODE_ITERS
    );

    // Shared parts decode to one instance each
    let decoded = graphref::decode_binary::<Item>(&binary, &mut SessionContext::new())
        .expect("Failed to decode binary")
        .expect("Product is present");
    if let Item::Assembly(top) = &*decoded {
        let mut instances = std::collections::HashSet::new();
        for child in top.children.iter().flatten() {
            if let Item::Assembly(sub) = &**child {
                for part in sub.children.iter().flatten() {
                    instances.insert(Arc::as_ptr(part));
                }
            }
        }
        println!(
            "\nDistinct part instances after decode: {} (of {} references)",
            instances.len(),
            assemblies * parts_per_assembly
        );
    }
}
