use alloy_primitives::B256;
use anyhow::{ensure, Context};
use guardian_consensus::deposit_tree::DepositTree;

use crate::cli::DepositRootCommand;

pub fn run(cmd: &DepositRootCommand) -> anyhow::Result<B256> {
    let contents = std::fs::read_to_string(&cmd.leaves)
        .with_context(|| format!("Failed to read {}", cmd.leaves.display()))?;
    root_from_lines(&contents)
}

/// Deposit root of the hex leaves in `contents`, one per line. Blank lines are skipped.
pub fn root_from_lines(contents: &str) -> anyhow::Result<B256> {
    let mut tree = DepositTree::new();
    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let leaf: B256 = line
            .parse()
            .with_context(|| format!("Invalid leaf on line {}", line_number + 1))?;
        let index = tree.node_count();
        ensure!(tree.insert(leaf, index), "Deposit tree is full");
    }
    Ok(tree.get_root())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;

    #[test]
    fn test_empty_input_gives_empty_root() {
        assert_eq!(
            root_from_lines("\n\n").unwrap(),
            b256!("d70a234731285c6804c2a4f56711ddb8c82c99740f207854891028af34e27e5e")
        );
    }

    #[test]
    fn test_two_leaves() {
        let contents = format!("{}\n{}\n", B256::repeat_byte(1), B256::repeat_byte(2));
        let mut tree = DepositTree::new();
        tree.insert(B256::repeat_byte(1), 0);
        tree.insert(B256::repeat_byte(2), 1);

        assert_eq!(root_from_lines(&contents).unwrap(), tree.get_root());
    }

    #[test]
    fn test_invalid_leaf_reports_line() {
        let err = root_from_lines("0x01\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
