use crate::cli::{emit, ProjectArgs};
use crate::output::load_map;
use crate::view::ViewerRole;

pub fn execute(args: ProjectArgs) -> anyhow::Result<()> {
    let role: ViewerRole = args.role.parse()?;
    let map = load_map(&args.map)?;
    emit(&map, Some(role))
}
