//! Generate a leaf mesh for every registered preset and print shape and
//! venation statistics.
use arbor_gen::prelude::*;
use arbor_gen_examples::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    for name in get_leaf_preset_names() {
        let preset = get_leaf_preset(name).expect("registry is consistent");
        let generator = LeafShapeGenerator::from_preset(preset);
        let mesh = generator.generate();
        mesh.validate()?;

        let vein_info = match mesh.float_attribute("vein_distance") {
            Some(distances) => {
                let max = distances.iter().fold(0.0f32, |a, &b| a.max(b));
                format!("vein_distance max {max:.3}")
            }
            None => "no venation".to_owned(),
        };
        println!(
            "{name:<8} {:>4} vertices {:>4} triangles  {vein_info}",
            mesh.vertices.len(),
            mesh.polygons.len(),
        );

        let card = generate_card(&mesh);
        println!("         card: {} vertices", card.vertices.len());
    }

    let views = get_impostor_view_directions(4);
    println!("impostor views: {}", views.len());
    Ok(())
}
