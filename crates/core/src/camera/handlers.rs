//! Detour bodies
//!
//! Each handler is a plain function of the frame context, the host records
//! involved and a closure that runs the original routine. The detours in
//! [`super::service`] wrap them with the raw adapters.

use glam::{Mat4, Vec2, Vec3};

use super::context::{FrameContext, SceneOverride};
use super::host::{CameraRecord, RenderMatrixSink, SceneCameraRecord};

/// Returned by the collision routine when the override replaces it
pub const COLLISION_OVERRIDDEN: isize = 0;

/// Camera update: run the original, then shift the host camera by the
/// selected camera's offset
pub fn camera_update<C>(
    ctx: &FrameContext<'_>,
    camera: Option<&mut C>,
    original: impl FnOnce() -> isize,
) -> isize
where
    C: CameraRecord + ?Sized,
{
    let result = original();

    if !ctx.gposing() {
        return result;
    }
    let (Some(manual), Some(camera)) = (ctx.authority().manual, camera) else {
        return result;
    };

    let offset = manual.position_offset;
    if offset != Vec3::ZERO {
        // Same delta on both keeps the orientation
        let position = camera.position();
        let look_at = camera.look_at();
        camera.set_position(position + offset);
        camera.set_look_at(look_at + offset);
    }

    result
}

/// Camera collision: either the original routine, or "nothing collides"
/// without calling it
pub fn camera_collision<C>(
    ctx: &FrameContext<'_>,
    camera: Option<&mut C>,
    original: impl FnOnce() -> isize,
) -> isize
where
    C: CameraRecord + ?Sized,
{
    let suppress = ctx.gposing()
        && ctx
            .authority()
            .manual
            .is_some_and(|manual| manual.suppress_collision);

    match camera {
        Some(camera) if suppress => {
            let distance = camera.max_distance();
            camera.set_collision(Vec2::splat(distance));
            COLLISION_OVERRIDDEN
        }
        _ => original(),
    }
}

/// Projection: substitute the cutscene FOV when it is enabled
pub fn projection<R>(ctx: &FrameContext<'_>, fov: f32, original: impl FnOnce(f32) -> R) -> R {
    let fov = match ctx.authority().fov {
        Some(override_fov) if ctx.gposing() => override_fov,
        _ => fov,
    };
    original(fov)
}

/// Scene update: run the original, then replace the scene and render view
/// matrices with the authoritative camera's
pub fn scene_update<S, L>(
    ctx: &mut FrameContext<'_>,
    scene: Option<&mut S>,
    sink: &mut L,
    original: impl FnOnce() -> isize,
) -> isize
where
    S: SceneCameraRecord + ?Sized,
    L: RenderMatrixSink + ?Sized,
{
    let result = original();

    if !ctx.gposing() {
        return result;
    }
    let Some(scene) = scene else {
        return result;
    };

    let matrix: Mat4 = match ctx.authority().scene {
        SceneOverride::None => return result,
        SceneOverride::FreeFly(matrix) => matrix,
        SceneOverride::Cutscene => match ctx.cutscene_matrix() {
            Some(matrix) => matrix,
            None => return result,
        },
    };

    // Scene and render caches must agree; without a render camera neither
    // is touched
    if !sink.has_render_camera() {
        return result;
    }
    scene.set_view_matrix(matrix);

    // The render load reads the matrix out of the scene record itself
    // SAFETY: the pointer targets the live scene record written above
    if !unsafe { sink.load(scene.view_matrix_ptr()) } {
        tracing::trace!("Render camera went away before the matrix load");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::context::{Authority, ManualCamera};
    use crate::camera::cutscene::CutsceneSource;
    use posecam_sdk::Matrix4x4;
    use std::cell::Cell;

    const ORIGINAL_RESULT: isize = 0x5151;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeCamera {
        position: Vec3,
        look_at: Vec3,
        max_distance: f32,
        collide: Vec2,
    }

    impl FakeCamera {
        fn new() -> Self {
            Self {
                position: Vec3::new(10.0, 2.0, -4.0),
                look_at: Vec3::new(11.0, 2.5, -3.0),
                max_distance: 20.0,
                collide: Vec2::new(3.0, 4.0),
            }
        }
    }

    impl CameraRecord for FakeCamera {
        fn position(&self) -> Vec3 {
            self.position
        }
        fn set_position(&mut self, position: Vec3) {
            self.position = position;
        }
        fn look_at(&self) -> Vec3 {
            self.look_at
        }
        fn set_look_at(&mut self, look_at: Vec3) {
            self.look_at = look_at;
        }
        fn max_distance(&self) -> f32 {
            self.max_distance
        }
        fn set_collision(&mut self, collide: Vec2) {
            self.collide = collide;
        }
    }

    #[derive(Debug, Default)]
    struct FakeScene {
        view: Matrix4x4,
        writes: usize,
    }

    impl SceneCameraRecord for FakeScene {
        fn view_matrix(&self) -> Mat4 {
            Mat4::from_cols_array(&self.view.m)
        }
        fn set_view_matrix(&mut self, matrix: Mat4) {
            self.view.m = matrix.to_cols_array();
            self.writes += 1;
        }
        fn view_matrix_ptr(&self) -> *const Matrix4x4 {
            &self.view
        }
    }

    #[derive(Debug)]
    struct FakeSink {
        ready: bool,
        loaded: Vec<Mat4>,
        sources: Vec<usize>,
    }

    impl FakeSink {
        fn ready() -> Self {
            Self {
                ready: true,
                loaded: Vec::new(),
                sources: Vec::new(),
            }
        }
    }

    impl RenderMatrixSink for FakeSink {
        fn has_render_camera(&self) -> bool {
            self.ready
        }

        unsafe fn load(&mut self, matrix: *const Matrix4x4) -> bool {
            if self.ready {
                self.loaded.push(Mat4::from_cols_array(&(*matrix).m));
                self.sources.push(matrix as usize);
            }
            self.ready
        }
    }

    #[derive(Default)]
    struct FakeCutscene {
        matrix: Option<Mat4>,
        requests: usize,
    }

    impl CutsceneSource for FakeCutscene {
        fn next_matrix(&mut self) -> Option<Mat4> {
            self.requests += 1;
            self.matrix
        }
    }

    fn manual(offset: Vec3, suppress_collision: bool) -> Authority {
        Authority {
            manual: Some(ManualCamera {
                position_offset: offset,
                suppress_collision,
            }),
            ..Authority::none()
        }
    }

    fn free_fly_matrix() -> Mat4 {
        Mat4::from_translation(Vec3::new(-1.0, -2.0, -3.0))
    }

    fn cutscene_matrix() -> Mat4 {
        Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0))
    }

    /// Every authority a frame can carry, for the pass-through checks
    fn all_authorities() -> Vec<Authority> {
        vec![
            Authority::none(),
            manual(Vec3::new(1.0, 2.0, 3.0), true),
            Authority {
                scene: SceneOverride::FreeFly(free_fly_matrix()),
                fov: Some(1.3),
                ..manual(Vec3::ONE, true)
            },
            Authority {
                scene: SceneOverride::Cutscene,
                fov: Some(0.4),
                ..Authority::none()
            },
        ]
    }

    #[test]
    fn test_pass_through_outside_pose_mode() {
        for authority in all_authorities() {
            let mut cutscene = FakeCutscene {
                matrix: Some(cutscene_matrix()),
                ..Default::default()
            };
            let mut ctx = FrameContext::new(false, authority, &mut cutscene);

            let mut camera = FakeCamera::new();
            let calls = Cell::new(0);
            let result = camera_update(&ctx, Some(&mut camera), || {
                calls.set(calls.get() + 1);
                ORIGINAL_RESULT
            });
            assert_eq!(result, ORIGINAL_RESULT);
            assert_eq!(camera, FakeCamera::new());

            let result = camera_collision(&ctx, Some(&mut camera), || {
                calls.set(calls.get() + 1);
                ORIGINAL_RESULT
            });
            assert_eq!(result, ORIGINAL_RESULT);
            assert_eq!(camera, FakeCamera::new());

            let passed = projection(&ctx, 0.9, |fov| {
                calls.set(calls.get() + 1);
                fov
            });
            assert_eq!(passed.to_bits(), 0.9f32.to_bits());

            let mut scene = FakeScene::default();
            let mut sink = FakeSink::ready();
            let result = scene_update(&mut ctx, Some(&mut scene), &mut sink, || {
                calls.set(calls.get() + 1);
                ORIGINAL_RESULT
            });
            assert_eq!(result, ORIGINAL_RESULT);
            assert_eq!(scene.writes, 0);
            assert!(sink.loaded.is_empty());

            assert_eq!(calls.get(), 4);
            assert_eq!(cutscene.requests, 0);
        }
    }

    #[test]
    fn test_pass_through_without_authority() {
        let mut cutscene = FakeCutscene {
            matrix: Some(cutscene_matrix()),
            ..Default::default()
        };
        let mut ctx = FrameContext::new(true, Authority::none(), &mut cutscene);

        let mut camera = FakeCamera::new();
        let calls = Cell::new(0);
        let count = || {
            calls.set(calls.get() + 1);
            ORIGINAL_RESULT
        };

        assert_eq!(camera_update(&ctx, Some(&mut camera), count), ORIGINAL_RESULT);
        assert_eq!(camera_collision(&ctx, Some(&mut camera), count), ORIGINAL_RESULT);
        assert_eq!(camera, FakeCamera::new());
        assert_eq!(projection(&ctx, 0.9, |fov| fov), 0.9);

        let mut scene = FakeScene::default();
        let mut sink = FakeSink::ready();
        assert_eq!(
            scene_update(&mut ctx, Some(&mut scene), &mut sink, count),
            ORIGINAL_RESULT
        );
        assert_eq!(scene.writes, 0);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_absent_records_pass_through() {
        for authority in all_authorities() {
            let mut cutscene = FakeCutscene {
                matrix: Some(cutscene_matrix()),
                ..Default::default()
            };
            let mut ctx = FrameContext::new(true, authority, &mut cutscene);
            let calls = Cell::new(0);
            let count = || {
                calls.set(calls.get() + 1);
                ORIGINAL_RESULT
            };

            assert_eq!(camera_update::<FakeCamera>(&ctx, None, count), ORIGINAL_RESULT);
            assert_eq!(camera_collision::<FakeCamera>(&ctx, None, count), ORIGINAL_RESULT);

            let mut sink = FakeSink::ready();
            assert_eq!(
                scene_update::<FakeScene, _>(&mut ctx, None, &mut sink, count),
                ORIGINAL_RESULT
            );
            assert!(sink.loaded.is_empty());
            assert_eq!(calls.get(), 3);
        }
    }

    #[test]
    fn test_update_applies_offset_to_position_and_look_at() {
        let offset = Vec3::new(0.5, -1.0, 2.0);
        let mut cutscene = FakeCutscene::default();
        let ctx = FrameContext::new(true, manual(offset, false), &mut cutscene);

        let mut camera = FakeCamera::new();
        let result = camera_update(&ctx, Some(&mut camera), || ORIGINAL_RESULT);

        let before = FakeCamera::new();
        assert_eq!(result, ORIGINAL_RESULT);
        assert_eq!(camera.position, before.position + offset);
        assert_eq!(camera.look_at, before.look_at + offset);
        assert_eq!(camera.look_at - camera.position, before.look_at - before.position);
    }

    #[test]
    fn test_update_zero_offset_is_identity() {
        let mut cutscene = FakeCutscene::default();
        let ctx = FrameContext::new(true, manual(Vec3::ZERO, false), &mut cutscene);

        let mut camera = FakeCamera::new();
        camera.position = Vec3::new(-0.0, 1.0, 2.0);
        let expected = camera.clone();

        camera_update(&ctx, Some(&mut camera), || ORIGINAL_RESULT);
        assert_eq!(camera.position.x.to_bits(), expected.position.x.to_bits());
        assert_eq!(camera, expected);
    }

    #[test]
    fn test_collision_override_skips_original() {
        let mut cutscene = FakeCutscene::default();
        let ctx = FrameContext::new(true, manual(Vec3::ZERO, true), &mut cutscene);

        let mut camera = FakeCamera::new();
        let calls = Cell::new(0);
        let result = camera_collision(&ctx, Some(&mut camera), || {
            calls.set(calls.get() + 1);
            ORIGINAL_RESULT
        });

        assert_eq!(result, COLLISION_OVERRIDDEN);
        assert_eq!(calls.get(), 0);
        assert_eq!(camera.collide, Vec2::splat(camera.max_distance));
    }

    #[test]
    fn test_collision_delegates_when_not_suppressed() {
        let mut cutscene = FakeCutscene::default();
        let ctx = FrameContext::new(true, manual(Vec3::ONE, false), &mut cutscene);

        let mut camera = FakeCamera::new();
        let calls = Cell::new(0);
        let result = camera_collision(&ctx, Some(&mut camera), || {
            calls.set(calls.get() + 1);
            ORIGINAL_RESULT
        });

        assert_eq!(result, ORIGINAL_RESULT);
        assert_eq!(calls.get(), 1);
        assert_eq!(camera.collide, FakeCamera::new().collide);
    }

    #[test]
    fn test_projection_substitutes_fov() {
        let mut cutscene = FakeCutscene::default();
        let authority = Authority {
            fov: Some(1.25),
            ..Authority::none()
        };
        let ctx = FrameContext::new(true, authority, &mut cutscene);
        assert_eq!(projection(&ctx, 0.8, |fov| fov), 1.25);
    }

    #[test]
    fn test_projection_without_override_passes_fov() {
        let mut cutscene = FakeCutscene::default();
        let ctx = FrameContext::new(true, manual(Vec3::ONE, true), &mut cutscene);
        assert_eq!(projection(&ctx, 0.8, |fov| fov), 0.8);
    }

    #[test]
    fn test_scene_free_fly_writes_both_caches() {
        let mut cutscene = FakeCutscene {
            matrix: Some(cutscene_matrix()),
            ..Default::default()
        };
        let authority = Authority {
            scene: SceneOverride::FreeFly(free_fly_matrix()),
            ..Authority::none()
        };
        let mut ctx = FrameContext::new(true, authority, &mut cutscene);

        let mut scene = FakeScene::default();
        let mut sink = FakeSink::ready();
        let result = scene_update(&mut ctx, Some(&mut scene), &mut sink, || ORIGINAL_RESULT);

        assert_eq!(result, ORIGINAL_RESULT);
        assert_eq!(scene.writes, 1);
        assert_eq!(scene.view_matrix(), free_fly_matrix());
        assert_eq!(sink.loaded, vec![free_fly_matrix()]);
        assert_eq!(sink.sources, vec![scene.view_matrix_ptr() as usize]);
        // The cutscene is never consulted while free-flying
        assert_eq!(cutscene.requests, 0);
    }

    #[test]
    fn test_scene_cutscene_writes_matrix() {
        let mut cutscene = FakeCutscene {
            matrix: Some(cutscene_matrix()),
            ..Default::default()
        };
        let authority = Authority {
            scene: SceneOverride::Cutscene,
            ..Authority::none()
        };
        let mut ctx = FrameContext::new(true, authority, &mut cutscene);

        let mut scene = FakeScene::default();
        let mut sink = FakeSink::ready();
        scene_update(&mut ctx, Some(&mut scene), &mut sink, || ORIGINAL_RESULT);

        assert_eq!(scene.writes, 1);
        assert_eq!(scene.view_matrix(), cutscene_matrix());
        assert_eq!(sink.loaded, vec![cutscene_matrix()]);
        assert_eq!(sink.sources, vec![scene.view_matrix_ptr() as usize]);
        assert_eq!(cutscene.requests, 1);
    }

    #[test]
    fn test_scene_cutscene_without_track_passes_through() {
        let mut cutscene = FakeCutscene::default();
        let authority = Authority {
            scene: SceneOverride::Cutscene,
            ..Authority::none()
        };
        let mut ctx = FrameContext::new(true, authority, &mut cutscene);

        let mut scene = FakeScene::default();
        let mut sink = FakeSink::ready();
        let result = scene_update(&mut ctx, Some(&mut scene), &mut sink, || ORIGINAL_RESULT);

        assert_eq!(result, ORIGINAL_RESULT);
        assert_eq!(scene.writes, 0);
        assert!(sink.loaded.is_empty());
    }

    #[test]
    fn test_scene_without_render_camera_writes_nothing() {
        let mut cutscene = FakeCutscene::default();
        let authority = Authority {
            scene: SceneOverride::FreeFly(free_fly_matrix()),
            ..Authority::none()
        };
        let mut ctx = FrameContext::new(true, authority, &mut cutscene);

        let mut scene = FakeScene::default();
        let mut sink = FakeSink {
            ready: false,
            ..FakeSink::ready()
        };
        let result = scene_update(&mut ctx, Some(&mut scene), &mut sink, || ORIGINAL_RESULT);

        assert_eq!(result, ORIGINAL_RESULT);
        assert_eq!(scene.writes, 0);
        assert_eq!(scene.view_matrix(), Mat4::IDENTITY);
    }
}
