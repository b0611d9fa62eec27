// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Distance-field construction: sample a shape's closest point at every
//! grid vertex.

use nalgebra::Point3;

use murmuration_field::{IndexWalk, SpaceGrid, VectorField};

use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore};

/// Build a 3-D distance grid over `[min, max]` sampling `shape`.
///
/// Every grid vertex stores the vector from the vertex to the shape's
/// closest surface point, both in world coordinates.
pub fn create_distance_grid(
    subdivisions: [usize; 3],
    min: [f64; 3],
    max: [f64; 3],
    store: &mut ObjectStore,
    shape: ObjectId,
) -> Result<SpaceGrid, SpaceError> {
    let mut grid = SpaceGrid::new(3, &subdivisions, &min, &max)?;
    fill_distance_grid(&mut grid, store, shape)?;
    Ok(grid)
}

/// Fill an existing 3-D grid (value length 3) with shape distance vectors.
pub fn fill_distance_grid(
    grid: &mut SpaceGrid,
    store: &mut ObjectStore,
    shape: ObjectId,
) -> Result<(), SpaceError> {
    check_grid(grid)?;
    let size = grid.subdivisions().to_vec();
    let end: Vec<usize> = size.iter().map(|n| n - 1).collect();

    for vertex in IndexWalk::new(&[0, 0, 0], &end) {
        let world = grid.vertex_to_position(&vertex)?;
        let vertex_point = Point3::new(world[0], world[1], world[2]);
        let closest = store.object_mut(shape)?.closest_point(&vertex_point)?;
        let offset = closest - vertex_point;
        grid.field_mut().set_at(&vertex, offset.as_slice())?;
    }
    Ok(())
}

/// Like [`fill_distance_grid`], scaling each vector componentwise by a
/// per-vertex scale field of the same size.
pub fn fill_distance_grid_scaled(
    grid: &mut SpaceGrid,
    store: &mut ObjectStore,
    shape: ObjectId,
    scale: &VectorField,
) -> Result<(), SpaceError> {
    check_grid(grid)?;
    if scale.dim() != 3 || scale.value_dim() != 3 {
        return Err(SpaceError::UnsupportedDimension {
            operation: "distance grid scale field",
            dim: scale.dim(),
        });
    }
    if scale.size() != grid.subdivisions() {
        return Err(murmuration_field::FieldError::SizeMismatch {
            expected: grid.subdivisions().to_vec(),
            found: scale.size().to_vec(),
        }
        .into());
    }

    let size = grid.subdivisions().to_vec();
    let end: Vec<usize> = size.iter().map(|n| n - 1).collect();
    for vertex in IndexWalk::new(&[0, 0, 0], &end) {
        let world = grid.vertex_to_position(&vertex)?;
        let vertex_point = Point3::new(world[0], world[1], world[2]);
        let closest = store.object_mut(shape)?.closest_point(&vertex_point)?;
        let factors = scale.value_at(&vertex)?;
        let value = [
            (closest.x - vertex_point.x) * factors[0],
            (closest.y - vertex_point.y) * factors[1],
            (closest.z - vertex_point.z) * factors[2],
        ];
        grid.field_mut().set_at(&vertex, &value)?;
    }
    Ok(())
}

fn check_grid(grid: &SpaceGrid) -> Result<(), SpaceError> {
    if grid.dim() != 3 {
        return Err(SpaceError::UnsupportedDimension {
            operation: "distance grid construction",
            dim: grid.dim(),
        });
    }
    if grid.value_dim() != 3 {
        return Err(SpaceError::UnsupportedDimension {
            operation: "distance grid value storage",
            dim: grid.value_dim(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LineSegment;
    use crate::object::SpaceObject;

    fn x_axis_line(store: &mut ObjectStore) -> ObjectId {
        store.insert(SpaceObject::with_shape(Box::new(LineSegment::new(
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ))))
    }

    #[test]
    fn vertices_point_at_the_line() {
        let mut store = ObjectStore::new();
        let shape = x_axis_line(&mut store);
        let grid = create_distance_grid(
            [3, 3, 3],
            [-1.0, -1.0, -1.0],
            [1.0, 1.0, 1.0],
            &mut store,
            shape,
        )
        .unwrap();

        // Vertex (1,1,1) sits at the origin, on the line.
        assert_eq!(grid.field().value_at(&[1, 1, 1]).unwrap(), &[0.0, 0.0, 0.0]);
        // Vertex (1,0,1) sits at (0,-1,0); the line is one unit up.
        assert_eq!(grid.field().value_at(&[1, 0, 1]).unwrap(), &[0.0, 1.0, 0.0]);
        // A corner vertex reaches diagonally back to the segment end.
        assert_eq!(grid.field().value_at(&[2, 2, 2]).unwrap(), &[0.0, -1.0, -1.0]);
    }

    #[test]
    fn scaled_fill_applies_per_vertex_factors() {
        let mut store = ObjectStore::new();
        let shape = x_axis_line(&mut store);
        let mut grid =
            SpaceGrid::new(3, &[3, 3, 3], &[-1.0, -1.0, -1.0], &[1.0, 1.0, 1.0]).unwrap();
        let mut scale = VectorField::new(&[3, 3, 3], 3).unwrap();
        scale.fill(&[2.0, 2.0, 2.0]).unwrap();

        fill_distance_grid_scaled(&mut grid, &mut store, shape, &scale).unwrap();
        assert_eq!(grid.field().value_at(&[1, 0, 1]).unwrap(), &[0.0, 2.0, 0.0]);

        let small = VectorField::new(&[2, 2, 2], 3).unwrap();
        assert!(fill_distance_grid_scaled(&mut grid, &mut store, shape, &small).is_err());
    }

    #[test]
    fn dimension_checks_are_explicit() {
        let mut store = ObjectStore::new();
        let shape = x_axis_line(&mut store);
        let mut flat = SpaceGrid::new(3, &[2, 2], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!(matches!(
            fill_distance_grid(&mut flat, &mut store, shape),
            Err(SpaceError::UnsupportedDimension { dim: 2, .. })
        ));
        let mut scalar = SpaceGrid::new(1, &[2, 2, 2], &[0.0; 3], &[1.0; 3]).unwrap();
        assert!(fill_distance_grid(&mut scalar, &mut store, shape).is_err());

        // The object must actually carry a shape.
        let point = store.insert(SpaceObject::new(3));
        let mut grid = SpaceGrid::new(3, &[2, 2, 2], &[0.0; 3], &[1.0; 3]).unwrap();
        assert!(matches!(
            fill_distance_grid(&mut grid, &mut store, point),
            Err(SpaceError::NotAShape)
        ));
    }
}
