//! Tree-walking utilities and in-place edits on SDUI node trees

pub mod patch;
pub mod variables;
pub mod walk;

pub use patch::{
    find_by_id, patch_by_id, replace_by_id, replace_first_by_type, replace_first_of_any,
    update_node, PatchOp, ACTION_KEY,
};
pub use variables::merge_card_variables;
pub use walk::{is_variant_component, node_id, node_type, Visit};
