use burn_dataset::{BatchIter, DatasetConfig, DecodeConfig, NormConfig};
use image::{GrayImage, Luma};
use std::fs;
use training::pack::{run_pack, PackArgs};

#[test]
fn packed_shards_follow_csv_order_per_fold() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let data = tmp.path().join("data");
    let train_images = tmp.path().join("train");
    let test_images = tmp.path().join("test");
    for dir in [&data, &train_images, &test_images] {
        fs::create_dir_all(dir)?;
    }
    let mut csv = String::from("image_id,label,fold_id\n");
    for i in 0..7 {
        GrayImage::from_fn(5, 5, |_, _| Luma([i as u8 * 30])).save(train_images.join(format!("t{i}.png")))?;
        csv.push_str(&format!("t{i},{},{}\n", i + 10, i % 2));
    }
    fs::write(data.join("train.csv"), csv)?;
    GrayImage::from_fn(5, 5, |_, _| Luma([9])).save(test_images.join("q0.png"))?;
    fs::write(data.join("test.csv"), "image_id\nq0.png\n")?;

    let args = PackArgs {
        data_dir: data,
        train_images_dir: train_images,
        test_images_dir: test_images,
        out_dir: tmp.path().join("rec"),
        image_ext: "png".into(),
        max_per_shard: 3,
        no_test: false,
    };
    let summary = run_pack(&args)?;
    assert_eq!(summary.total_records(), 8);
    let names: Vec<String> = summary
        .shards
        .iter()
        .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["fold.0.rec-00000", "fold.0.rec-00001", "fold.1.rec", "test.rec"]
    );

    let decode = DecodeConfig {
        dim_pre: 4,
        channels: 1,
    };
    let norm = NormConfig {
        dim: 4,
        inverted: false,
    };
    let mut iter = BatchIter::from_pattern(
        &burn_dataset::fold_pattern(&args.out_dir, 0),
        DatasetConfig::eval(decode, norm, 8, None, false),
    )?;
    let device = Default::default();
    let batch = iter
        .next_batch::<burn_ndarray::NdArray<f32>>(&device)?
        .expect("one batch");
    assert_eq!(batch.targets, vec![10, 12, 14, 16]);
    Ok(())
}
