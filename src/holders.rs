/// ASN holder and neighbour metadata cache.
///
/// Data source:
/// RIPEstat data API, https://stat.ripe.net/docs/02.data-api/
///
/// Lookups against RIPEstat are slow and rate-limited, so fetched holder
/// and neighbour records are kept in a local SQLite database and reused
/// until their TTL expires.
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AsnscopeDatabase;

/// Holder metadata for a single ASN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnHolder {
    pub asn: u32,
    pub holder: String,
    pub country: Option<String>,
    pub announced: bool,
}

/// BGP adjacency relation reported by RIPEstat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborKind {
    Left,
    Right,
    Uncertain,
}

impl fmt::Display for NeighborKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighborKind::Left => write!(f, "left"),
            NeighborKind::Right => write!(f, "right"),
            NeighborKind::Uncertain => write!(f, "uncertain"),
        }
    }
}

impl FromStr for NeighborKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(NeighborKind::Left),
            "right" => Ok(NeighborKind::Right),
            "uncertain" => Ok(NeighborKind::Uncertain),
            other => Err(format!("unknown neighbour kind: {}", other)),
        }
    }
}

/// One BGP neighbour of an ASN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnNeighbor {
    pub asn: u32,
    pub kind: NeighborKind,
    pub power: u32,
}

pub struct HolderStore {
    db: AsnscopeDatabase,
    holder_ttl_secs: u64,
    neighbor_ttl_secs: u64,
}

impl HolderStore {
    pub fn new(
        db_path: &Option<String>,
        holder_ttl_secs: u64,
        neighbor_ttl_secs: u64,
    ) -> Result<HolderStore> {
        let db = AsnscopeDatabase::new(db_path)?;
        Self::initialize_db(&db)?;
        Ok(HolderStore {
            db,
            holder_ttl_secs,
            neighbor_ttl_secs,
        })
    }

    fn initialize_db(db: &AsnscopeDatabase) -> Result<()> {
        db.conn.execute(
            r#"
        create table if not exists asn_holder (
        asn INTEGER PRIMARY KEY,
        holder TEXT,
        country TEXT,
        announced INTEGER,
        updated_at INTEGER
        );
        "#,
            [],
        )?;
        db.conn.execute(
            r#"
        create table if not exists asn_neighbor (
        asn INTEGER,
        neighbor INTEGER,
        rel TEXT,
        power INTEGER
        );
        "#,
            [],
        )?;
        db.conn.execute(
            r#"
        create table if not exists asn_neighbor_meta (
        asn INTEGER PRIMARY KEY,
        updated_at INTEGER
        );
        "#,
            [],
        )?;
        db.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_asn_neighbor_asn ON asn_neighbor(asn)",
            [],
        )?;
        Ok(())
    }

    fn fresh(&self, updated_at: i64, ttl_secs: u64) -> bool {
        updated_at + ttl_secs as i64 >= Utc::now().timestamp()
    }

    /// Look up a cached holder record, honoring the configured TTL.
    pub fn get_holder(&self, asn: u32) -> Result<Option<AsnHolder>> {
        let mut stmt = self.db.conn.prepare(
            "select holder, country, announced, updated_at from asn_holder where asn = ?1",
        )?;
        let mut rows = stmt.query_map([asn], |row| {
            Ok((
                AsnHolder {
                    asn,
                    holder: row.get(0)?,
                    country: row.get(1)?,
                    announced: row.get::<_, i64>(2)? != 0,
                },
                row.get::<_, i64>(3)?,
            ))
        })?;

        match rows.next() {
            Some(row) => {
                let (holder, updated_at) = row?;
                if self.fresh(updated_at, self.holder_ttl_secs) {
                    Ok(Some(holder))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Insert or replace a holder record, stamped with the current time.
    pub fn put_holder(&self, holder: &AsnHolder) -> Result<()> {
        self.db.conn.execute(
            "insert or replace into asn_holder (asn, holder, country, announced, updated_at) \
             values (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                holder.asn,
                holder.holder,
                holder.country,
                holder.announced as i64,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Look up the cached neighbour list for an ASN.
    ///
    /// Returns `None` when the ASN has never been fetched or the cached
    /// entry expired; `Some(vec![])` means a fetch found no neighbours.
    pub fn get_neighbors(&self, asn: u32) -> Result<Option<Vec<AsnNeighbor>>> {
        let updated_at: Option<i64> = self
            .db
            .conn
            .query_row(
                "select updated_at from asn_neighbor_meta where asn = ?1",
                [asn],
                |row| row.get(0),
            )
            .ok();

        match updated_at {
            Some(t) if self.fresh(t, self.neighbor_ttl_secs) => {}
            _ => return Ok(None),
        }

        let mut stmt = self
            .db
            .conn
            .prepare("select neighbor, rel, power from asn_neighbor where asn = ?1")?;
        let rows = stmt.query_map([asn], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;

        let mut neighbors = vec![];
        for row in rows {
            let (neighbor, rel, power) = row?;
            let kind = NeighborKind::from_str(rel.as_str()).map_err(|e| anyhow!(e))?;
            neighbors.push(AsnNeighbor {
                asn: neighbor,
                kind,
                power,
            });
        }
        Ok(Some(neighbors))
    }

    /// Replace the neighbour set for an ASN in one transaction.
    pub fn put_neighbors(&self, asn: u32, neighbors: &[AsnNeighbor]) -> Result<()> {
        let tx = self.db.conn.unchecked_transaction()?;
        tx.execute("delete from asn_neighbor where asn = ?1", [asn])?;
        {
            let mut stmt = tx.prepare_cached(
                "insert into asn_neighbor (asn, neighbor, rel, power) values (?1, ?2, ?3, ?4)",
            )?;
            for neighbor in neighbors {
                stmt.execute(rusqlite::params![
                    asn,
                    neighbor.asn,
                    neighbor.kind.to_string(),
                    neighbor.power,
                ])?;
            }
        }
        tx.execute(
            "insert or replace into asn_neighbor_meta (asn, updated_at) values (?1, ?2)",
            rusqlite::params![asn, Utc::now().timestamp()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> HolderStore {
        HolderStore::new(&None, 3600, 3600).unwrap()
    }

    #[test]
    fn test_holder_roundtrip() {
        let store = memory_store();
        assert!(store.get_holder(13335).unwrap().is_none());

        let holder = AsnHolder {
            asn: 13335,
            holder: "CLOUDFLARENET".to_string(),
            country: Some("US".to_string()),
            announced: true,
        };
        store.put_holder(&holder).unwrap();

        let cached = store.get_holder(13335).unwrap().unwrap();
        assert_eq!(cached.holder, "CLOUDFLARENET");
        assert_eq!(cached.country.as_deref(), Some("US"));
        assert!(cached.announced);
    }

    #[test]
    fn test_holder_ttl_expiry() {
        // zero TTL: every cached entry is already stale
        let store = HolderStore::new(&None, 0, 0).unwrap();
        let holder = AsnHolder {
            asn: 15169,
            holder: "GOOGLE".to_string(),
            country: Some("US".to_string()),
            announced: true,
        };
        store.put_holder(&holder).unwrap();
        // fresh() uses >= so a zero TTL entry written this second is still
        // accepted; backdate the row to force expiry
        store
            .db
            .conn
            .execute(
                "update asn_holder set updated_at = updated_at - 10 where asn = 15169",
                [],
            )
            .unwrap();
        assert!(store.get_holder(15169).unwrap().is_none());
    }

    #[test]
    fn test_neighbors_roundtrip() {
        let store = memory_store();
        assert!(store.get_neighbors(3356).unwrap().is_none());

        let neighbors = vec![
            AsnNeighbor {
                asn: 1299,
                kind: NeighborKind::Left,
                power: 12,
            },
            AsnNeighbor {
                asn: 174,
                kind: NeighborKind::Right,
                power: 3,
            },
        ];
        store.put_neighbors(3356, &neighbors).unwrap();

        let cached = store.get_neighbors(3356).unwrap().unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].asn, 1299);
        assert_eq!(cached[0].kind, NeighborKind::Left);
    }

    #[test]
    fn test_neighbors_empty_set_is_cached() {
        let store = memory_store();
        store.put_neighbors(64512, &[]).unwrap();
        // an empty fetch result is remembered, not treated as a miss
        assert_eq!(store.get_neighbors(64512).unwrap().unwrap().len(), 0);
    }

    #[test]
    fn test_neighbors_replaced() {
        let store = memory_store();
        store
            .put_neighbors(
                3356,
                &[AsnNeighbor {
                    asn: 1299,
                    kind: NeighborKind::Left,
                    power: 12,
                }],
            )
            .unwrap();
        store
            .put_neighbors(
                3356,
                &[AsnNeighbor {
                    asn: 6939,
                    kind: NeighborKind::Uncertain,
                    power: 1,
                }],
            )
            .unwrap();

        let cached = store.get_neighbors(3356).unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].asn, 6939);
    }
}
