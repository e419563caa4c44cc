use crate::config::Params;

/// Subsidy paid to a block at main height `height`, halving every
/// `subsidy_reduction_interval` heights.
pub fn calc_block_subsidy(params: &Params, height: u64) -> u64 {
    if params.subsidy_reduction_interval == 0 {
        return params.base_subsidy;
    }
    let halvings = height / params.subsidy_reduction_interval;
    if halvings >= 64 {
        return 0;
    }
    params.base_subsidy >> halvings
}
