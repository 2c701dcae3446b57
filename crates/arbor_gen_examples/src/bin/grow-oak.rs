//! Grow a trunk with two nested branch levels and print mesh statistics.
use arbor_gen::mesher::attributes;
use arbor_gen::prelude::*;
use arbor_gen_examples::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut tree = Tree::new(
        FunctionNode::new(TrunkFunction {
            seed: 7,
            length: 12.0,
            ..TrunkFunction::default()
        })
        .with_child(
            FunctionNode::new(BranchFunction {
                seed: 11,
                length: Property::random(4.0, 7.0),
                crown: CrownParams {
                    shape: CrownShape::Conical,
                    angle_variation: 20.0,
                    ..CrownParams::default()
                },
                ..BranchFunction::default()
            })
            .with_child(FunctionNode::new(BranchFunction {
                seed: 13,
                length: Property::Constant(2.0),
                start_radius: Property::Constant(0.3),
                ..BranchFunction::default()
            })),
        ),
    );
    tree.execute_functions();

    let mesher = ManifoldMesher {
        radial_resolution: 12,
        ..ManifoldMesher::default()
    };
    let mesh = mesher.mesh_tree(&tree);
    mesh.validate()?;

    println!("stems:    {}", tree.stems().len());
    println!("vertices: {}", mesh.vertices.len());
    println!("polygons: {}", mesh.polygons.len());
    for name in [
        attributes::RADIUS,
        attributes::STEM_ID,
        attributes::PHYLLOTAXIS_ANGLE,
    ] {
        let present = mesh.attributes.contains_key(name);
        println!("attribute {name}: {}", if present { "yes" } else { "missing" });
    }
    Ok(())
}
