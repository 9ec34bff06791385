use geo::{Coord, CoordsIter, Geometry, LineString, Point, Polygon};

/// Append a coordinate sequence as an SVG subpath: "M x,y L x,y ..." (closed with Z for rings).
fn push_subpath(line: &LineString<f64>, closed: bool, project: &impl Fn(Coord<f64>) -> (f64, f64), out: &mut String) {
    let mut coords = line.coords_iter().map(project);
    let Some((x, y)) = coords.next() else { return };
    out.push_str(&format!(" M{x:.3},{y:.3}"));
    for (x, y) in coords {
        out.push_str(&format!(" L{x:.3},{y:.3}"));
    }
    if closed { out.push('Z') }
}

fn push_polygon(polygon: &Polygon<f64>, project: &impl Fn(Coord<f64>) -> (f64, f64), out: &mut String) {
    push_subpath(polygon.exterior(), true, project, out);
    for interior in polygon.interiors() {
        push_subpath(interior, true, project, out);
    }
}

/// Build a compact SVG path for the areal and linear parts of a geometry (exteriors + holes).
/// Points contribute nothing; draw them with [`geometry_points`].
pub(crate) fn geometry_to_path(geometry: &Geometry<f64>, project: &impl Fn(Coord<f64>) -> (f64, f64)) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Polygon(polygon) => push_polygon(polygon, project, &mut out),
        Geometry::MultiPolygon(polygons) => polygons.iter().for_each(|p| push_polygon(p, project, &mut out)),
        Geometry::LineString(line) => push_subpath(line, false, project, &mut out),
        Geometry::MultiLineString(lines) => lines.iter().for_each(|l| push_subpath(l, false, project, &mut out)),
        Geometry::Rect(rect) => push_polygon(&rect.to_polygon(), project, &mut out),
        Geometry::Triangle(triangle) => push_polygon(&triangle.to_polygon(), project, &mut out),
        Geometry::GeometryCollection(collection) => collection.iter()
            .for_each(|g| out.push_str(&geometry_to_path(g, project))),
        Geometry::Line(_) | Geometry::Point(_) | Geometry::MultiPoint(_) => {}
    }
    out
}

/// Point members of a geometry.
pub(crate) fn geometry_points(geometry: &Geometry<f64>) -> Vec<Point<f64>> {
    match geometry {
        Geometry::Point(point) => vec![*point],
        Geometry::MultiPoint(points) => points.0.clone(),
        Geometry::GeometryCollection(collection) => collection.iter().flat_map(geometry_points).collect(),
        _ => Vec::new(),
    }
}

/// Whether a geometry has any areal part, so it should be filled.
pub(crate) fn is_areal(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => true,
        Geometry::GeometryCollection(collection) => collection.iter().any(is_areal),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, point, polygon};

    use super::*;

    fn identity(c: Coord<f64>) -> (f64, f64) { (c.x, c.y) }

    #[test]
    fn polygon_with_hole_has_two_closed_subpaths() {
        let polygon: Geometry<f64> = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0)]],
        ).into();
        let path = geometry_to_path(&polygon, &identity);
        assert_eq!(path.matches('M').count(), 2);
        assert_eq!(path.matches('Z').count(), 2);
        assert!(path.starts_with(" M0.000,0.000 L4.000,0.000"));
        assert!(is_areal(&polygon));
    }

    #[test]
    fn lines_are_open() {
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        let path = geometry_to_path(&line, &identity);
        assert_eq!(path, " M0.000,0.000 L1.000,1.000");
        assert!(!is_areal(&line));
    }

    #[test]
    fn points_are_collected_not_pathed() {
        let point: Geometry<f64> = point!(x: 3.0, y: 4.0).into();
        assert!(geometry_to_path(&point, &identity).is_empty());
        assert_eq!(geometry_points(&point), vec![point!(x: 3.0, y: 4.0)]);
    }
}
