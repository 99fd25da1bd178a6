//! Deterministic synthetic ownership data.
//!
//! Shared by `ownernet generate` and the perf harness. Same arguments, same
//! document, on every platform.

use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use ownernet_store::{
    EntityDocument, GraphDocument, RelationshipDocument, KIND_COMPANY, KIND_PERSON,
    REL_BOARD_MEMBER, REL_OWNS, REL_PARTNER,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub(crate) struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub(crate) fn new(seed: u64) -> Self {
        // All-zero state never leaves zero.
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub(crate) fn gen_range_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() % (upper as u64)) as usize
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    pub(crate) fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.gen_range_usize(items.len())]
    }
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Chloe", "Dmitri", "Elena", "Farid", "Greta", "Hiro", "Ines", "Jonas",
    "Kofi", "Lena", "Mateo", "Nadia", "Oskar", "Priya", "Quentin", "Rosa", "Sven", "Tara",
];
const LAST_NAMES: &[&str] = &[
    "Almeida", "Berg", "Castell", "Dubois", "Eriksen", "Fischer", "Garcia", "Haddad",
    "Ivanova", "Jensen", "Kowalski", "Larsen", "Moreau", "Novak", "Okafor", "Petrov",
];
const COMPANY_STEMS: &[&str] = &[
    "Apex", "Borealis", "Cobalt", "Delta", "Ember", "Fjord", "Granite", "Helix", "Ion",
    "Juniper", "Keystone", "Lumen", "Meridian", "Nimbus", "Orbit", "Pioneer",
];
const COMPANY_SUFFIXES: &[&str] = &[
    "Holdings",
    "Capital",
    "Group",
    "Partners",
    "Industries",
    "Ventures",
];
const INDUSTRIES: &[&str] = &[
    "Technology",
    "Finance",
    "Healthcare",
    "Energy",
    "Retail",
    "Manufacturing",
    "Real Estate",
    "Media",
    "Transportation",
    "Education",
];
const JURISDICTIONS: &[&str] = &["DE", "FR", "GB", "LU", "NL", "US", "KY", "SG"];
const STATUSES: &[&str] = &["Active", "Active", "Active", "Dissolved"];
const OWNERSHIP_TYPES: &[&str] = &["Direct", "Indirect", "Beneficial"];
const BOARD_POSITIONS: &[&str] = &[
    "Chairman",
    "CEO",
    "CTO",
    "CFO",
    "COO",
    "Director",
    "Independent Director",
];
const PARTNERSHIP_TYPES: &[&str] = &[
    "Joint Venture",
    "Strategic Alliance",
    "Supplier Agreement",
    "Distribution Partnership",
    "Technology Partnership",
];

#[derive(Args, Debug, Clone)]
pub(crate) struct GenerateArgs {
    #[arg(long, default_value_t = 1_000)]
    pub(crate) people: usize,

    #[arg(long, default_value_t = 500)]
    pub(crate) companies: usize,

    #[arg(long, default_value_t = 3_000)]
    pub(crate) ownerships: usize,

    #[arg(long, default_value_t = 800)]
    pub(crate) board_positions: usize,

    #[arg(long, default_value_t = 300)]
    pub(crate) partnerships: usize,

    /// RNG seed (deterministic).
    #[arg(long, default_value_t = 1)]
    pub(crate) seed: u64,

    /// Output document (stdout when omitted)
    #[arg(short, long)]
    pub(crate) out: Option<PathBuf>,
}

pub(crate) fn person_id(i: usize) -> String {
    format!("person_{}", i + 1)
}

pub(crate) fn company_id(i: usize) -> String {
    format!("company_{}", i + 1)
}

fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Percentage in `[0.10, 25.00]` with two decimals.
fn holding(rng: &mut XorShift64) -> f64 {
    (10 + rng.gen_range_usize(2_491)) as f64 / 100.0
}

pub(crate) fn build_document(args: &GenerateArgs) -> Result<GraphDocument> {
    if args.companies == 0 && (args.ownerships > 0 || args.board_positions > 0) {
        return Err(anyhow!("--companies must be > 0 to generate relationships"));
    }
    if args.people == 0 && args.board_positions > 0 {
        return Err(anyhow!("--people must be > 0 to generate board positions"));
    }
    if args.companies < 2 && args.partnerships > 0 {
        return Err(anyhow!("--companies must be >= 2 to generate partnerships"));
    }

    let mut rng = XorShift64::new(args.seed);
    let mut doc = GraphDocument::default();

    for i in 0..args.people {
        let name = format!("{} {}", rng.pick(FIRST_NAMES), rng.pick(LAST_NAMES));
        let net_worth = 50_000 + rng.gen_range_usize(49_950_001);
        doc.entities.push(EntityDocument {
            id: person_id(i),
            kind: KIND_PERSON.to_string(),
            name,
            attributes: attrs([
                ("net_worth", json!(net_worth)),
                ("nationality", json!(rng.pick(JURISDICTIONS))),
            ]),
        });
    }

    for i in 0..args.companies {
        let name = format!(
            "{} {} {}",
            rng.pick(COMPANY_STEMS),
            rng.pick(COMPANY_SUFFIXES),
            i + 1
        );
        doc.entities.push(EntityDocument {
            id: company_id(i),
            kind: KIND_COMPANY.to_string(),
            name,
            attributes: attrs([
                ("industry", json!(rng.pick(INDUSTRIES))),
                ("jurisdiction", json!(rng.pick(JURISDICTIONS))),
                ("status", json!(rng.pick(STATUSES))),
                ("founded_year", json!(1950 + rng.gen_range_usize(74))),
            ]),
        });
    }

    for _ in 0..args.ownerships {
        let owner = if args.people > 0 && rng.gen_bool() {
            person_id(rng.gen_range_usize(args.people))
        } else {
            company_id(rng.gen_range_usize(args.companies))
        };
        let owned = company_id(rng.gen_range_usize(args.companies));
        if owner == owned {
            continue;
        }
        doc.relationships.push(RelationshipDocument {
            source: owner,
            target: owned,
            kind: REL_OWNS.to_string(),
            percentage: Some(holding(&mut rng)),
            attributes: attrs([
                ("ownership_type", json!(rng.pick(OWNERSHIP_TYPES))),
                ("voting_rights", json!(rng.gen_bool())),
            ]),
        });
    }

    for _ in 0..args.board_positions {
        doc.relationships.push(RelationshipDocument {
            source: person_id(rng.gen_range_usize(args.people)),
            target: company_id(rng.gen_range_usize(args.companies)),
            kind: REL_BOARD_MEMBER.to_string(),
            percentage: None,
            attributes: attrs([("position", json!(rng.pick(BOARD_POSITIONS)))]),
        });
    }

    for _ in 0..args.partnerships {
        let a = rng.gen_range_usize(args.companies);
        let b = rng.gen_range_usize(args.companies);
        if a == b {
            continue;
        }
        doc.relationships.push(RelationshipDocument {
            source: company_id(a),
            target: company_id(b),
            kind: REL_PARTNER.to_string(),
            percentage: None,
            attributes: attrs([("partnership_type", json!(rng.pick(PARTNERSHIP_TYPES)))]),
        });
    }

    Ok(doc)
}

pub(crate) fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let doc = build_document(args)?;
    match &args.out {
        Some(out) => {
            doc.write_json_file(out)?;
            eprintln!(
                "{} {} entities, {} relationships → {}",
                "wrote".green().bold(),
                doc.entities.len(),
                doc.relationships.len(),
                out.display().to_string().bold()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&doc)?),
    }
    Ok(())
}
