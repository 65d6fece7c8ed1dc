use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const ADDRESS_BOOK_FILE: &str = "addresses.json";

/// Chain identifier the dashboard targets unless overridden on the CLI.
/// This is a configured value, not derived from the connected node; the
/// wallet layer logs a warning when the node reports something else.
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

// Sepolia deployment of the lottery contract.
const DEFAULT_SEPOLIA_ADDRESS: &str = "0x84f6e23a57e0a4dc5e44bbbb2ccba4cb9bc16abd";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractRecord {
    pub recorded_at: String,
    pub chain_id: u64,
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl ContractRecord {
    pub fn parse_address(&self) -> Result<Address> {
        Address::from_str(self.address.trim()).map_err(|e| {
            eyre!(
                "Address book entry for chain {} holds an invalid address {:?}: {e}",
                self.chain_id,
                self.address
            )
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AddressBook {
    pub contracts: Vec<ContractRecord>,
}

impl AddressBook {
    pub fn lookup(&self, chain_id: u64) -> Option<&ContractRecord> {
        self.contracts.iter().find(|r| r.chain_id == chain_id)
    }

    pub fn upsert(&mut self, record: ContractRecord) {
        if let Some(existing) = self
            .contracts
            .iter_mut()
            .find(|r| r.chain_id == record.chain_id)
        {
            *existing = record;
        } else {
            self.contracts.push(record);
        }
    }
}

/// On-disk store mapping chain ids to recorded contract addresses.
#[derive(Debug)]
pub struct AddressStore {
    path: PathBuf,
}

impl AddressStore {
    pub fn open() -> Result<Self> {
        let path = ensure_store()?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AddressBook> {
        read_book(&self.path)
    }

    pub fn save(&self, book: &AddressBook) -> Result<()> {
        write_book(&self.path, book)
    }

    /// Resolves the contract address for a chain id or explains where to
    /// add one.
    pub fn contract_address(&self, chain_id: u64) -> Result<Address> {
        let book = self.load()?;
        let record = book.lookup(chain_id).ok_or_else(|| {
            eyre!(
                "No contract recorded for chain id {chain_id}. Add an entry to {}",
                self.path.display()
            )
        })?;
        record.parse_address()
    }
}

#[allow(dead_code)]
pub fn record_contract(
    chain_id: u64,
    address: impl AsRef<str>,
    label: Option<impl AsRef<str>>,
) -> Result<()> {
    let store = AddressStore::open()?;
    let mut book = store.load()?;
    book.upsert(ContractRecord {
        recorded_at: Utc::now().to_rfc3339(),
        chain_id,
        address: address.as_ref().to_string(),
        label: label.map(|l| l.as_ref().to_string()),
    });
    store.save(&book)
}

pub fn ensure_structure() -> Result<()> {
    let _ = ensure_store()?;
    Ok(())
}

fn ensure_store() -> Result<PathBuf> {
    let root = Path::new(DEPLOYMENTS_ROOT);
    if !root.exists() {
        fs::create_dir_all(root).wrap_err("Failed to create .deployments directory")?;
    }

    let file_path = root.join(ADDRESS_BOOK_FILE);
    if !file_path.exists() {
        write_book(&file_path, &default_book())?;
    }

    Ok(file_path)
}

fn default_book() -> AddressBook {
    AddressBook {
        contracts: vec![ContractRecord {
            recorded_at: Utc::now().to_rfc3339(),
            chain_id: DEFAULT_CHAIN_ID,
            address: DEFAULT_SEPOLIA_ADDRESS.to_string(),
            label: Some("sepolia".to_string()),
        }],
    }
}

fn read_book(path: impl AsRef<Path>) -> Result<AddressBook> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read address book")?;
    if data.is_empty() {
        return Ok(AddressBook::default());
    }
    serde_json::from_slice::<AddressBook>(&data).wrap_err("Failed to parse address book JSON")
}

fn write_book(path: impl AsRef<Path>, book: &AddressBook) -> Result<()> {
    let json = serde_json::to_vec_pretty(book).wrap_err("Failed to serialize address book")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write address book")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn lookup__finds_record_by_chain_id() {
        // given
        let book = default_book();

        // when
        let record = book.lookup(DEFAULT_CHAIN_ID);

        // then
        assert!(record.is_some());
        assert!(book.lookup(1).is_none());
    }

    #[test]
    fn upsert__replaces_record_for_same_chain() {
        // given
        let mut book = default_book();
        let replacement = ContractRecord {
            recorded_at: "2025-01-01T00:00:00Z".to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            address: "0x0000000000000000000000000000000000000001".to_string(),
            label: None,
        };

        // when
        book.upsert(replacement);

        // then
        assert_eq!(book.contracts.len(), 1);
        assert_eq!(
            book.lookup(DEFAULT_CHAIN_ID).unwrap().address,
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn parse_address__accepts_the_default_record() {
        // given
        let book = default_book();

        // when
        let parsed = book.lookup(DEFAULT_CHAIN_ID).unwrap().parse_address();

        // then
        assert!(parsed.is_ok());
    }

    #[test]
    fn parse_address__rejects_malformed_entries() {
        // given
        let record = ContractRecord {
            recorded_at: "2025-01-01T00:00:00Z".to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            address: "not-an-address".to_string(),
            label: None,
        };

        // when
        let parsed = record.parse_address();

        // then
        assert!(parsed.is_err());
    }
}
